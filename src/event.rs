//! Event records and the event-list file reader
//!
//! The analysis consumes an ordered stream of per-event records: an
//! absolute timestamp plus, when the DAQ provides them, the two hardware
//! scalar counters. The file reader accepts JSON objects (one per line) and
//! whitespace columns, either `mjd_day seconds_of_day [clock busy]` or a
//! single decimal MJD day. Blank lines and `#` comments are skipped;
//! malformed lines are logged and skipped, never fatal.

use crate::time::ObsTime;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One event of the run's stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventRecord {
    pub time: ObsTime,
    /// Hardware (clock, busy) counter pair, when the event carries one
    pub counters: Option<(u32, u32)>,
}

/// JSON spelling of an event line
#[derive(Debug, Deserialize, Serialize)]
struct JsonEvent {
    mjd_day: u32,
    seconds_of_day: f64,
    #[serde(default)]
    clock: Option<u32>,
    #[serde(default)]
    busy: Option<u32>,
}

impl From<JsonEvent> for EventRecord {
    fn from(e: JsonEvent) -> Self {
        EventRecord {
            time: ObsTime::from_mjd_parts(e.mjd_day, e.seconds_of_day),
            counters: match (e.clock, e.busy) {
                (Some(clock), Some(busy)) => Some((clock, busy)),
                _ => None,
            },
        }
    }
}

/// Parse one event-list line; None for blanks, comments and malformed lines
pub fn parse_event_line(line: &str) -> Option<EventRecord> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    if trimmed.starts_with('{') {
        return match serde_json::from_str::<JsonEvent>(trimmed) {
            Ok(event) => Some(event.into()),
            Err(e) => {
                tracing::warn!(error = %e, "malformed JSON event line skipped");
                None
            }
        };
    }

    let cols: Vec<&str> = trimmed.split_whitespace().collect();
    // One column: decimal MJD day. Two or more: integer day + seconds-of-day.
    let time = match cols.as_slice() {
        [day] => day.parse::<f64>().ok().map(ObsTime::from_decimal_mjd),
        [day, seconds, ..] => day
            .parse::<u32>()
            .ok()
            .zip(seconds.parse::<f64>().ok())
            .map(|(day, seconds)| ObsTime::from_mjd_parts(day, seconds)),
        [] => None,
    };
    let Some(time) = time else {
        tracing::warn!(line = trimmed, "malformed event line skipped");
        return None;
    };
    let counters = match cols.get(2).zip(cols.get(3)) {
        Some((clock, busy)) => match (clock.parse(), busy.parse()) {
            (Ok(clock), Ok(busy)) => Some((clock, busy)),
            _ => {
                tracing::warn!(line = trimmed, "unparseable counters dropped from event");
                None
            }
        },
        None => None,
    };
    Some(EventRecord { time, counters })
}

/// Read a whole event list from disk
pub fn read_event_list(path: &Path) -> Result<Vec<EventRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open event list {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line.context("failed to read event list line")?;
        if let Some(event) = parse_event_line(&line) {
            events.push(event);
        }
    }
    tracing::debug!(count = events.len(), path = %path.display(), "event list read");
    Ok(events)
}
