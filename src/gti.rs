//! Good-Time-Interval extraction over a finalized time mask
//!
//! The mask is coarse (whole seconds); consumers need interval boundaries at
//! sub-second accuracy. The extractor scans the search window in steps of
//! `step`: an outer scan locates a closed→open transition, a nested scan at
//! the same step locates the matching open→closed transition (or the window
//! end), and the pair is emitted as one GTI. Boundary accuracy is ±step/2.
//!
//! Cost is O(window / step); the sample budget caps a scan that a careless
//! caller would otherwise let run over a huge window at a tiny step.

use crate::mask::TimeMask;
use serde::{Deserialize, Serialize};

/// Scan parameters for GTI extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GtiParams {
    /// Sampling step in seconds
    pub step: f64,
    /// Ceiling on mask probes for one extraction
    pub max_samples: usize,
}

impl Default for GtiParams {
    fn default() -> Self {
        GtiParams {
            step: 1e-4,
            max_samples: 30_000_000,
        }
    }
}

impl GtiParams {
    pub fn validate(&self) -> Result<(), String> {
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(format!("step must be positive, got {}", self.step));
        }
        if self.max_samples == 0 {
            return Err("max_samples must be non-zero".to_string());
        }
        Ok(())
    }
}

/// One contiguous span of usable time, in seconds from the run start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gti {
    pub begin: f64,
    pub end: f64,
}

impl Gti {
    pub fn duration(&self) -> f64 {
        self.end - self.begin
    }
}

/// Extract GTIs from `[search_start, search_end)` of a finalized mask
///
/// Times are seconds from the run start. A scan that never observes a state
/// transition emits one GTI spanning the whole window (legacy behavior,
/// preserved even for an all-closed mask). When the sample budget runs out
/// an in-progress interval is closed at the current position and the scan
/// stops.
pub fn extract(
    mask: &TimeMask,
    params: &GtiParams,
    search_start: f64,
    search_end: f64,
) -> Vec<Gti> {
    let mut gtis = Vec::new();
    if search_end <= search_start || params.validate().is_err() {
        tracing::warn!(
            search_start,
            search_end,
            step = params.step,
            "degenerate GTI search, emitting whole window"
        );
        gtis.push(Gti {
            begin: search_start,
            end: search_end.max(search_start),
        });
        return gtis;
    }

    let origin = mask.start_time();
    let probe = |t: f64| -> bool {
        origin.is_some_and(|o| mask.is_open(o.offset(t)))
    };

    let step = params.step;
    let mut budget = params.max_samples;
    let mut pos = search_start;

    while pos < search_end && budget > 0 {
        budget -= 1;
        if !probe(pos) {
            pos += step;
            continue;
        }

        // Open sample: nested scan for the closing edge
        let begin = pos;
        pos += step;
        let end = loop {
            if pos >= search_end {
                break search_end;
            }
            if budget == 0 {
                tracing::warn!(
                    begin,
                    pos,
                    "GTI sample budget exhausted, closing interval at scan position"
                );
                break pos;
            }
            budget -= 1;
            if !probe(pos) {
                break pos;
            }
            pos += step;
        };
        gtis.push(Gti { begin, end });
        pos += step;
    }

    if gtis.is_empty() {
        // No transition observed over the whole scan
        gtis.push(Gti {
            begin: search_start,
            end: search_end,
        });
    }
    gtis
}
