//! Dead-time estimation from inter-event time differences (method A)
//!
//! Consecutive admitted events of a Poisson process have exponentially
//! distributed separations; dead time removes the short-Δt part of that
//! spectrum. The estimator histograms Δt, fits the surviving exponential
//! tail, locates the dead threshold Δt* below which the spectrum is empty,
//! and reports the missing integral `1 − exp(Δt*·b)` as the dead fraction.
//!
//! A 2-D (Δt × run-time) companion histogram repeats the procedure per
//! run-time slice for time-resolved fractions, with the fit covariance
//! propagated into a per-slice error.

use crate::deadtime::config::DeadTimeConfig;
use crate::deadtime::fit::{fit_exponential, ExpFit};
use crate::histogram::{Hist1D, Hist2D};
use serde::{Deserialize, Serialize};

/// Time-resolved fraction for one run-time slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceFraction {
    /// Slice center in seconds from run start
    pub time: f64,
    pub fraction: f64,
    /// Propagated one-sigma error from the slice fit
    pub error: f64,
}

/// Finalized method-A result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TdiffResult {
    /// Run-average dead fraction in [0, 1]
    pub fraction: f64,
    /// Dead threshold Δt* in seconds (0 when no spectrum was found)
    pub threshold: f64,
    /// Full-range exponential fit, when one converged
    pub fit: Option<ExpFit>,
    /// Per-slice fractions; None for slices with too few entries
    pub slices: Vec<Option<SliceFraction>>,
}

/// Inter-event-difference dead-time estimator for one run
#[derive(Debug, Clone)]
pub struct TdiffEstimator {
    config: DeadTimeConfig,
    hist: Hist1D,
    hist2d: Hist2D,
    last_time: Option<f64>,
    non_monotonic: u64,
    result: Option<TdiffResult>,
}

impl TdiffEstimator {
    /// Create an estimator for a run of (at most) `duration` seconds
    pub fn new(config: &DeadTimeConfig, duration: f64) -> Self {
        let duration = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            crate::mask::MAX_RUN_SECONDS
        };
        let slices = (duration / config.time_slice_width).ceil().max(1.0) as usize;
        TdiffEstimator {
            hist: Hist1D::new(config.tdiff_bins, 0.0, config.tdiff_range),
            hist2d: Hist2D::new(
                config.tdiff_bins,
                0.0,
                config.tdiff_range,
                slices,
                0.0,
                slices as f64 * config.time_slice_width,
            ),
            config: config.clone(),
            last_time: None,
            non_monotonic: 0,
            result: None,
        }
    }

    /// Accumulate one admitted event at `t` seconds from run start
    pub fn feed(&mut self, t: f64) {
        if let Some(prev) = self.last_time {
            let dt = t - prev;
            if dt < 0.0 {
                self.non_monotonic += 1;
                tracing::warn!(
                    dt,
                    t,
                    "non-monotonic event timestamp, difference not histogrammed"
                );
            } else {
                self.hist.fill(dt);
                self.hist2d.fill(dt, t);
            }
        }
        self.last_time = Some(t);
    }

    /// Non-monotonic timestamp pairs seen during the run
    pub fn non_monotonic(&self) -> u64 {
        self.non_monotonic
    }

    /// Δt histogram accumulated so far
    pub fn histogram(&self) -> &Hist1D {
        &self.hist
    }

    /// (Δt × run-time) histogram accumulated so far
    pub fn histogram_2d(&self) -> &Hist2D {
        &self.hist2d
    }

    /// Run the fits; idempotent after the first call
    pub fn finalize(&mut self) {
        if self.result.is_some() {
            return;
        }

        let (fraction, threshold, fit) = analyze(&self.hist, &self.config);

        let mut slices = Vec::with_capacity(self.hist2d.y_bins());
        for j in 0..self.hist2d.y_bins() {
            let slice = self.hist2d.x_slice(j);
            if slice.entries() <= self.config.min_slice_entries {
                slices.push(None);
                continue;
            }
            let (f, thr, slice_fit) = analyze(&slice, &self.config);
            let error = slice_fit
                .as_ref()
                .map(|fit| (thr * (thr * fit.slope).exp()).abs() * fit.slope_error())
                .unwrap_or(0.0);
            slices.push(Some(SliceFraction {
                time: self.hist2d.y_center(j),
                fraction: f,
                error,
            }));
        }

        self.result = Some(TdiffResult {
            fraction,
            threshold,
            fit,
            slices,
        });
    }

    /// Finalized result; None before [`TdiffEstimator::finalize`]
    pub fn result(&self) -> Option<&TdiffResult> {
        self.result.as_ref()
    }

    /// Run-average dead fraction (0 before finalize or with no data)
    pub fn fraction(&self) -> f64 {
        self.result.as_ref().map_or(0.0, |r| r.fraction)
    }

    /// Time-resolved fraction at `t` seconds from run start, when the slice
    /// containing `t` was fit
    pub fn slice_fraction_at(&self, t: f64) -> Option<&SliceFraction> {
        let result = self.result.as_ref()?;
        let j = self.hist2d.y_bin_for(t)?;
        result.slices.get(j)?.as_ref()
    }

    /// Rebuild from persisted parts; absent histograms contribute nothing
    pub(crate) fn from_parts(
        config: &DeadTimeConfig,
        hist: Option<Hist1D>,
        hist2d: Option<Hist2D>,
        result: Option<TdiffResult>,
    ) -> Self {
        let mut est = TdiffEstimator::new(config, crate::mask::MAX_RUN_SECONDS);
        if let Some(hist) = hist {
            est.hist = hist;
        }
        if let Some(hist2d) = hist2d {
            est.hist2d = hist2d;
        }
        est.result = result.or(Some(TdiffResult {
            fraction: 0.0,
            threshold: 0.0,
            fit: None,
            slices: Vec::new(),
        }));
        est
    }
}

/// Fit one Δt spectrum: returns (fraction, threshold, fit)
fn analyze(hist: &Hist1D, config: &DeadTimeConfig) -> (f64, f64, Option<ExpFit>) {
    let fit = fit_exponential(hist, config.fit_window_lo, config.fit_window_hi);
    let Some(ref f) = fit else {
        return (0.0, 0.0, fit);
    };
    let Some(threshold) = dead_threshold(hist, config.empty_bin_run) else {
        return (0.0, 0.0, fit);
    };

    let mut fraction = 1.0 - (threshold * f.slope).exp();
    if !fraction.is_finite() {
        fraction = 0.0;
    }
    fraction = fraction.clamp(0.0, 1.0);
    if fraction < config.min_fraction {
        fraction = 0.0;
    }
    (fraction, threshold, fit)
}

/// Locate the dead threshold Δt*
///
/// Walk from the count-weighted mean occupied bin toward the origin; the
/// first occupied bin preceded by `empty_bin_run` consecutive empty bins is
/// the edge of the dead region. With no such gap the first occupied bin of
/// the histogram is used.
fn dead_threshold(hist: &Hist1D, empty_bin_run: usize) -> Option<f64> {
    let mean = hist.mean_occupied_bin()?;
    let counts = hist.counts();
    let mut i = mean.min(counts.len() - 1);
    loop {
        if counts[i] > 0.0
            && i >= empty_bin_run
            && counts[i - empty_bin_run..i].iter().all(|&c| c == 0.0)
        {
            return Some(hist.bin_low_edge(i));
        }
        if i == 0 {
            break;
        }
        i -= 1;
    }
    hist.first_occupied_bin().map(|i| hist.bin_low_edge(i))
}
