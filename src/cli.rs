//! CLI argument parsing for the run-quality analyzer

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the run summary
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "lapso")]
#[command(version)]
#[command(about = "Run time-mask, dead-time and GTI analysis", long_about = None)]
pub struct Cli {
    /// Run identifier
    #[arg(short = 'r', long = "run", value_name = "ID")]
    pub run_id: u32,

    /// Integer MJD day of the run window
    #[arg(long = "mjd", value_name = "DAY")]
    pub mjd_day: u32,

    /// Run start, seconds of day
    #[arg(long = "start", value_name = "SEC", default_value = "0")]
    pub start_sec: f64,

    /// Run end, seconds of day
    #[arg(long = "end", value_name = "SEC")]
    pub end_sec: f64,

    /// Mask override file (lines `*<run> <start> <width> <mode>`)
    #[arg(long = "overrides", value_name = "FILE")]
    pub overrides: Option<PathBuf>,

    /// Calibration constants (TOML)
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Weight livetime with the tdiff run average instead of per-bin scalars
    #[arg(long = "prefer-tdiff")]
    pub prefer_tdiff: bool,

    /// Write the finalized mask snapshot here
    #[arg(long = "save-mask", value_name = "FILE")]
    pub save_mask: Option<PathBuf>,

    /// Write the finalized dead-time snapshot here
    #[arg(long = "save-deadtime", value_name = "FILE")]
    pub save_deadtime: Option<PathBuf>,

    /// Enable debug logging to stderr
    #[arg(long)]
    pub debug: bool,

    /// Event list (one event per line)
    #[arg(value_name = "EVENTS")]
    pub events: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_minimal_invocation() {
        let cli = Cli::parse_from([
            "lapso", "--run", "12345", "--mjd", "58000", "--end", "3600", "events.txt",
        ]);
        assert_eq!(cli.run_id, 12345);
        assert_eq!(cli.mjd_day, 58000);
        assert_eq!(cli.start_sec, 0.0);
        assert_eq!(cli.end_sec, 3600.0);
        assert_eq!(cli.events, PathBuf::from("events.txt"));
        assert!(!cli.prefer_tdiff);
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_parses_full_invocation() {
        let cli = Cli::parse_from([
            "lapso",
            "-r",
            "7",
            "--mjd",
            "58000",
            "--start",
            "100.5",
            "--end",
            "1900.5",
            "--overrides",
            "mask.dat",
            "--format",
            "json",
            "--prefer-tdiff",
            "--save-mask",
            "mask.json",
            "events.txt",
        ]);
        assert_eq!(cli.run_id, 7);
        assert_eq!(cli.start_sec, 100.5);
        assert!(cli.prefer_tdiff);
        assert!(cli.overrides.is_some());
        assert!(cli.save_mask.is_some());
        assert!(matches!(cli.format, OutputFormat::Json));
    }

    #[test]
    fn test_cli_requires_run_and_window() {
        assert!(Cli::try_parse_from(["lapso", "events.txt"]).is_err());
    }
}
