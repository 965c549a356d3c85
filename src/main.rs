use anyhow::Result;
use clap::Parser;
use lapso::cli::{Cli, OutputFormat};
use lapso::config::AnalysisConfig;
use lapso::event::read_event_list;
use lapso::persistence;
use lapso::run::RunQuality;
use lapso::time::ObsTime;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = match &cli.config {
        Some(path) => AnalysisConfig::from_toml_path(path)?,
        None => AnalysisConfig::default(),
    };

    let start = ObsTime::from_mjd_parts(cli.mjd_day, cli.start_sec);
    let end = ObsTime::from_mjd_parts(cli.mjd_day, cli.end_sec);
    let mut run = RunQuality::new(
        cli.run_id,
        start,
        end,
        &config,
        cli.overrides.as_deref(),
    );

    let events = read_event_list(&cli.events)?;
    for event in &events {
        run.ingest(event);
        run.record_counted(event.time);
    }
    run.finalize();

    let summary = run.summary(cli.prefer_tdiff);
    match cli.format {
        OutputFormat::Text => print!("{}", summary.to_report_string()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }

    if let Some(path) = &cli.save_mask {
        persistence::save_mask(run.mask(), path)?;
    }
    if let Some(path) = &cli.save_deadtime {
        persistence::save_deadtime(run.deadtime(), path)?;
    }

    Ok(())
}
