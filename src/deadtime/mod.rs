// Dual-method dead-time estimation with cross-validation
//
// Two independent estimators measure the same quantity from different
// information: method A from the inter-event-difference spectrum
// (tdiff), method B from hardware busy/clock scalar counters (scaler).
// Their reconciliation yields the run's dead fraction plus an advisory
// consistency status; disagreement never aborts an analysis, it only
// downgrades which estimate is trusted.

mod config;
mod fit;
mod scaler;
mod tdiff;

pub use config::DeadTimeConfig;
pub use fit::{fit_exponential, ExpFit};
pub use scaler::{wrap_delta, ScalerEstimator, ScalerResult};
pub use tdiff::{SliceFraction, TdiffEstimator, TdiffResult};

#[cfg(test)]
mod tests;

use crate::mask::TimeMask;
use serde::{Deserialize, Serialize};

/// Agreement between the two dead-time methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileStatus {
    /// Scalar data exists and both methods agree within tolerance; the
    /// scalar average is the trusted value
    Consistent,
    /// Methods disagree or scalar data is absent; the tdiff average is used
    Inconsistent,
}

/// Reconciled dead-time estimate for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadTimeEstimate {
    /// Method-A run average, in [0, 1]
    pub tdiff_fraction: f64,
    /// Method-B run average, in [0, 1]
    pub scalar_fraction: f64,
    /// The trusted fraction after reconciliation
    pub overall: f64,
    pub status: ReconcileStatus,
}

/// Per-run dead-time estimator pairing both methods
///
/// Lifecycle: construct at run start, [`DeadTimeEstimator::feed`] once per
/// admitted event, [`DeadTimeEstimator::finalize`] exactly once after the
/// stream ends, then query. Instances are never shared across runs.
#[derive(Debug, Clone)]
pub struct DeadTimeEstimator {
    config: DeadTimeConfig,
    tdiff: TdiffEstimator,
    scaler: ScalerEstimator,
    finalized: bool,
}

impl DeadTimeEstimator {
    /// Create an estimator for a run of (at most) `duration` seconds
    pub fn new(config: &DeadTimeConfig, duration: f64) -> Self {
        DeadTimeEstimator {
            config: config.clone(),
            tdiff: TdiffEstimator::new(config, duration),
            scaler: ScalerEstimator::new(config),
            finalized: false,
        }
    }

    /// Accumulate one admitted event at `t` seconds from run start, with
    /// its hardware counter pair when the event carries one
    pub fn feed(&mut self, t: f64, counters: Option<(u32, u32)>) {
        if self.finalized {
            tracing::warn!(t, "event fed after finalize, ignored");
            return;
        }
        self.tdiff.feed(t);
        if let Some((clock, busy)) = counters {
            self.scaler.feed(t, clock, busy);
        }
    }

    /// Run both fits; idempotent after the first call
    pub fn finalize(&mut self) {
        self.tdiff.finalize();
        self.scaler.finalize();
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn tdiff(&self) -> &TdiffEstimator {
        &self.tdiff
    }

    pub fn scaler(&self) -> &ScalerEstimator {
        &self.scaler
    }

    /// Reconcile the two methods; never fails
    ///
    /// The scalar average is trusted when scalar data exists and both run
    /// averages agree within the configured tolerance; otherwise the tdiff
    /// average is used and the estimate is flagged inconsistent. A missing
    /// method simply does not participate.
    pub fn compute(&self) -> DeadTimeEstimate {
        let tdiff_fraction = self.tdiff.fraction();
        let scalar_fraction = self.scaler.fraction();

        let consistent = self.scaler.has_data()
            && (scalar_fraction - tdiff_fraction).abs() < self.config.reconcile_tolerance;

        if !consistent && self.scaler.has_data() {
            tracing::warn!(
                tdiff_fraction,
                scalar_fraction,
                tolerance = self.config.reconcile_tolerance,
                "dead-time methods disagree, falling back to tdiff estimate"
            );
        }

        DeadTimeEstimate {
            tdiff_fraction,
            scalar_fraction,
            overall: if consistent {
                scalar_fraction
            } else {
                tdiff_fraction
            },
            status: if consistent {
                ReconcileStatus::Consistent
            } else {
                ReconcileStatus::Inconsistent
            },
        }
    }

    /// Time-resolved dead fraction at `t` seconds from run start
    ///
    /// With `prefer_tdiff` the single run-average tdiff fraction is
    /// returned (method A has no trusted time dependence); otherwise the
    /// scalar per-bin fraction at `t`, falling back to the scalar run
    /// average where no bin data exists. Either way a value above the
    /// unreliability cutoff is discarded for the tdiff run average, since a
    /// near-empty scalar bin can read as total deadness.
    pub fn fraction_at(&self, t: f64, prefer_tdiff: bool) -> f64 {
        let value = if prefer_tdiff {
            self.tdiff.fraction()
        } else {
            self.scaler.fraction_at(t)
        };
        if value > self.config.scaler_unreliable_cutoff {
            self.tdiff.fraction()
        } else {
            value
        }
    }

    /// Dead fraction averaged over the open seconds of a mask
    ///
    /// Each open second contributes its midpoint query; a mask with no open
    /// second falls back to the run-average of the selected method.
    pub fn fraction_over(&self, mask: &TimeMask, prefer_tdiff: bool) -> f64 {
        let mut sum = 0.0;
        let mut n = 0u64;
        for s in 0..mask.len() {
            if mask.is_open_second(s) {
                sum += self.fraction_at(s as f64 + 0.5, prefer_tdiff);
                n += 1;
            }
        }
        if n > 0 {
            sum / n as f64
        } else {
            let value = if prefer_tdiff {
                self.tdiff.fraction()
            } else {
                self.scaler.fraction()
            };
            if value > self.config.scaler_unreliable_cutoff {
                self.tdiff.fraction()
            } else {
                value
            }
        }
    }

    /// Rebuild from persisted parts; missing sections contribute nothing
    pub(crate) fn from_parts(
        config: &DeadTimeConfig,
        tdiff: TdiffEstimator,
        scaler: ScalerEstimator,
    ) -> Self {
        DeadTimeEstimator {
            config: config.clone(),
            tdiff,
            scaler,
            finalized: true,
        }
    }
}
