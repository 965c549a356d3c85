// Configuration for dead-time estimation
//
// Every empirical cutoff used by the two estimators and their
// reconciliation is a named, overridable field here. The defaults are
// instrument tuning inherited from operations; none has a first-principles
// derivation, so nothing is hard-coded at the use sites.

use serde::{Deserialize, Serialize};

/// Configuration for the dual dead-time estimators
///
/// # Example
/// ```
/// use lapso::deadtime::DeadTimeConfig;
///
/// let config = DeadTimeConfig::default();
/// assert_eq!(config.reconcile_tolerance, 0.2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadTimeConfig {
    /// Upper edge of the Δt histogram in seconds (lower edge is 0)
    ///
    /// Differences above this carry no dead-time information and land in
    /// the overflow counter.
    pub tdiff_range: f64,

    /// Number of Δt histogram bins (0.5 ms at the defaults)
    pub tdiff_bins: usize,

    /// Lower edge of the exponential-fit window in seconds
    ///
    /// Tuning constant: just above the longest dead period ever observed,
    /// so the fitted region is pure Poisson tail.
    pub fit_window_lo: f64,

    /// Upper edge of the exponential-fit window in seconds
    pub fit_window_hi: f64,

    /// Consecutive empty bins that terminate the threshold scan
    ///
    /// Walking from the mean occupied bin toward the origin, the first
    /// occupied bin preceded by this many empty bins marks the dead
    /// threshold Δt*.
    pub empty_bin_run: usize,

    /// Fractions below this clamp to exactly zero
    pub min_fraction: f64,

    /// Width of one run-time slice of the 2-D (Δt × run-time) histogram,
    /// in seconds
    pub time_slice_width: f64,

    /// Minimum entries for a run-time slice to be fit
    ///
    /// Slices below this produce slopes dominated by fluctuation; they are
    /// skipped and report no time-resolved value.
    pub min_slice_entries: f64,

    /// Width of one hardware-scalar accumulation bin in seconds
    pub scaler_bin_width: f64,

    /// Scalar fractions above this are treated as unreliable
    ///
    /// A near-empty accumulator bin can read as total deadness; queries
    /// falling on such a bin fall back to the Δt-fit run average.
    pub scaler_unreliable_cutoff: f64,

    /// Maximum |scalar − tdiff| for the two methods to reconcile
    pub reconcile_tolerance: f64,
}

impl Default for DeadTimeConfig {
    fn default() -> Self {
        Self {
            tdiff_range: 0.2,
            tdiff_bins: 400,
            fit_window_lo: 0.004,
            fit_window_hi: 0.015,
            empty_bin_run: 3,
            min_fraction: 1e-5,
            time_slice_width: 120.0,
            min_slice_entries: 1000.0,
            scaler_bin_width: 10.0,
            scaler_unreliable_cutoff: 0.98,
            reconcile_tolerance: 0.2,
        }
    }
}

impl DeadTimeConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.tdiff_range.is_finite() || self.tdiff_range <= 0.0 {
            return Err(format!("tdiff_range must be positive, got {}", self.tdiff_range));
        }
        if self.tdiff_bins == 0 {
            return Err("tdiff_bins must be non-zero".to_string());
        }
        if self.fit_window_lo < 0.0 || self.fit_window_hi <= self.fit_window_lo {
            return Err(format!(
                "fit window [{}, {}] must be ordered and non-negative",
                self.fit_window_lo, self.fit_window_hi
            ));
        }
        if self.empty_bin_run == 0 {
            return Err("empty_bin_run must be at least 1".to_string());
        }
        if !self.time_slice_width.is_finite() || self.time_slice_width <= 0.0 {
            return Err(format!(
                "time_slice_width must be positive, got {}",
                self.time_slice_width
            ));
        }
        if !self.scaler_bin_width.is_finite() || self.scaler_bin_width <= 0.0 {
            return Err(format!(
                "scaler_bin_width must be positive, got {}",
                self.scaler_bin_width
            ));
        }
        if !(0.0..=1.0).contains(&self.scaler_unreliable_cutoff) {
            return Err(format!(
                "scaler_unreliable_cutoff must be in [0, 1], got {}",
                self.scaler_unreliable_cutoff
            ));
        }
        if !self.reconcile_tolerance.is_finite() || self.reconcile_tolerance <= 0.0 {
            return Err(format!(
                "reconcile_tolerance must be positive, got {}",
                self.reconcile_tolerance
            ));
        }
        Ok(())
    }
}
