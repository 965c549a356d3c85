//! Canonical absolute-time representation for run analysis
//!
//! Event lists arrive with two timestamp spellings: integer MJD day plus
//! seconds-of-day, or a single decimal MJD day. Both collapse to one internal
//! type, seconds since the MJD epoch as `f64`, so that every downstream
//! computation (mask offsets, Δt histograms, GTI scans) works in plain
//! seconds.

use serde::{Deserialize, Serialize};

/// Seconds in one MJD day
pub const SECONDS_PER_DAY: f64 = 86400.0;

/// An absolute instant, stored as seconds since the MJD epoch (MJD 0.0)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ObsTime(f64);

impl ObsTime {
    /// Construct from an integer MJD day and seconds elapsed within that day
    pub fn from_mjd_parts(day: u32, seconds_of_day: f64) -> Self {
        ObsTime(f64::from(day) * SECONDS_PER_DAY + seconds_of_day)
    }

    /// Construct from a decimal MJD day (e.g. 58000.041666...)
    pub fn from_decimal_mjd(day: f64) -> Self {
        ObsTime(day * SECONDS_PER_DAY)
    }

    /// Construct directly from seconds since the MJD epoch
    pub fn from_seconds(seconds: f64) -> Self {
        ObsTime(seconds)
    }

    /// Seconds since the MJD epoch
    pub fn as_seconds(&self) -> f64 {
        self.0
    }

    /// Decimal MJD day
    pub fn as_mjd(&self) -> f64 {
        self.0 / SECONDS_PER_DAY
    }

    /// Signed offset in seconds from `origin` to this instant
    pub fn seconds_since(&self, origin: ObsTime) -> f64 {
        self.0 - origin.0
    }

    /// This instant shifted forward by `seconds` (negative shifts backward)
    pub fn offset(&self, seconds: f64) -> ObsTime {
        ObsTime(self.0 + seconds)
    }
}
