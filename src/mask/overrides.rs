//! Override-file parsing for the time mask
//!
//! Plain-text format, one directive per line:
//!
//! ```text
//! * 64080  120  30  0
//! ```
//!
//! closes (`mode 0`) or opens (`mode 1`) `width_sec` seconds of run
//! `run_id` starting at `start_sec` from the run start. Lines that do not
//! match the data-line shape (comments, headers, junk) are ignored.

use regex::Regex;

/// One parsed override directive
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideLine {
    pub run_id: u32,
    pub start_sec: f64,
    pub width_sec: f64,
    /// true opens the range, false closes it
    pub open: bool,
}

/// Parse one line of an override file; None for non-data lines
pub fn parse_override_line(line: &str) -> Option<OverrideLine> {
    // Data lines: *<run_id> <start_sec> <width_sec> <mode 0|1>
    let re = Regex::new(
        r"^\s*\*\s*(\d+)\s+(\d+(?:\.\d+)?)\s+(\d+(?:\.\d+)?)\s+([01])\s*$",
    )
    .ok()?;
    let caps = re.captures(line)?;
    Some(OverrideLine {
        run_id: caps[1].parse().ok()?,
        start_sec: caps[2].parse().ok()?,
        width_sec: caps[3].parse().ok()?,
        open: &caps[4] == "1",
    })
}
