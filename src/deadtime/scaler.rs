//! Dead-time estimation from hardware scalar counters (method B)
//!
//! Each event carries two free-running 32-bit tick counters, one clocked
//! continuously and one gated by DAQ busy. The ratio of busy ticks to clock
//! ticks accumulated per time bin is a direct dead-fraction measurement,
//! independent of the event-spacing statistics used by method A. Counters
//! wrap at `2^32 − 1`; deltas are corrected before accumulation.

use crate::deadtime::config::DeadTimeConfig;
use serde::{Deserialize, Serialize};

/// Finalized method-B result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerResult {
    /// Per-time-bin dead fractions (0 for bins without clock ticks)
    pub fractions: Vec<f64>,
    /// Per-bin binomial errors
    pub errors: Vec<f64>,
    /// Run-average busy/clock ratio
    pub average: f64,
    /// Reduced chi-square of per-bin fractions against the run average;
    /// a data-quality signal, large values mean a non-uniform dead time
    pub reduced_chi2: f64,
}

/// Hardware-scalar dead-time estimator for one run
#[derive(Debug, Clone)]
pub struct ScalerEstimator {
    config: DeadTimeConfig,
    prev: Option<(u32, u32)>,
    clock_bins: Vec<f64>,
    busy_bins: Vec<f64>,
    total_clock: f64,
    total_busy: f64,
    result: Option<ScalerResult>,
}

/// Counter difference with wraparound correction at `2^32 − 1`
pub fn wrap_delta(previous: u32, current: u32) -> u64 {
    if current >= previous {
        u64::from(current - previous)
    } else {
        (u64::from(u32::MAX) - u64::from(previous)) + u64::from(current)
    }
}

impl ScalerEstimator {
    pub fn new(config: &DeadTimeConfig) -> Self {
        ScalerEstimator {
            config: config.clone(),
            prev: None,
            clock_bins: Vec::new(),
            busy_bins: Vec::new(),
            total_clock: 0.0,
            total_busy: 0.0,
            result: None,
        }
    }

    /// Accumulate one event's counter pair at `t` seconds from run start
    ///
    /// The first event only seeds the previous-value pair; accumulation
    /// starts with the second. Events before the run start are skipped.
    pub fn feed(&mut self, t: f64, clock: u32, busy: u32) {
        let prev = self.prev.replace((clock, busy));
        let Some((prev_clock, prev_busy)) = prev else {
            return;
        };
        if t < 0.0 || !t.is_finite() {
            return;
        }

        let bin = (t / self.config.scaler_bin_width) as usize;
        if bin >= self.clock_bins.len() {
            self.clock_bins.resize(bin + 1, 0.0);
            self.busy_bins.resize(bin + 1, 0.0);
        }

        let clock_delta = wrap_delta(prev_clock, clock) as f64;
        let busy_delta = wrap_delta(prev_busy, busy) as f64;
        self.clock_bins[bin] += clock_delta;
        self.busy_bins[bin] += busy_delta;
        self.total_clock += clock_delta;
        self.total_busy += busy_delta;
    }

    /// Whether any counter ticks were accumulated
    pub fn has_data(&self) -> bool {
        self.total_clock > 0.0
    }

    /// Compute per-bin ratios, run average and chi-square; idempotent
    pub fn finalize(&mut self) {
        if self.result.is_some() {
            return;
        }

        let average = if self.total_clock > 0.0 {
            (self.total_busy / self.total_clock).min(1.0)
        } else {
            0.0
        };

        let mut fractions = Vec::with_capacity(self.clock_bins.len());
        let mut errors = Vec::with_capacity(self.clock_bins.len());
        let mut chi2 = 0.0;
        let mut used = 0usize;
        for (&clock, &busy) in self.clock_bins.iter().zip(&self.busy_bins) {
            if clock <= 0.0 {
                fractions.push(0.0);
                errors.push(0.0);
                continue;
            }
            let f = (busy / clock).min(1.0);
            let err = (f * (1.0 - f) / clock).max(0.0).sqrt();
            if err > 0.0 {
                let pull = (f - average) / err;
                chi2 += pull * pull;
                used += 1;
            }
            fractions.push(f);
            errors.push(err);
        }

        let reduced_chi2 = if used > 1 {
            chi2 / (used as f64 - 1.0)
        } else {
            0.0
        };
        if reduced_chi2 > 10.0 {
            tracing::warn!(
                reduced_chi2,
                "scalar dead fractions are strongly non-uniform across the run"
            );
        }

        self.result = Some(ScalerResult {
            fractions,
            errors,
            average,
            reduced_chi2,
        });
    }

    /// Finalized result; None before [`ScalerEstimator::finalize`]
    pub fn result(&self) -> Option<&ScalerResult> {
        self.result.as_ref()
    }

    /// Run-average dead fraction (0 before finalize or with no data)
    pub fn fraction(&self) -> f64 {
        self.result.as_ref().map_or(0.0, |r| r.average)
    }

    /// Per-bin fraction at `t` seconds from run start; the run average when
    /// `t` falls outside the accumulated bins or the bin saw no clock ticks
    pub fn fraction_at(&self, t: f64) -> f64 {
        let Some(result) = self.result.as_ref() else {
            return 0.0;
        };
        if t < 0.0 || !t.is_finite() {
            return result.average;
        }
        let bin = (t / self.config.scaler_bin_width) as usize;
        let has_ticks = self.clock_bins.get(bin).copied().unwrap_or(0.0) > 0.0;
        match result.fractions.get(bin) {
            Some(&f) if has_ticks => f,
            _ => result.average,
        }
    }

    /// Rebuild from persisted parts; absent accumulators contribute nothing
    pub(crate) fn from_parts(
        config: &DeadTimeConfig,
        clock_bins: Option<Vec<f64>>,
        busy_bins: Option<Vec<f64>>,
        result: Option<ScalerResult>,
    ) -> Self {
        let clock_bins = clock_bins.unwrap_or_default();
        let mut busy_bins = busy_bins.unwrap_or_default();
        busy_bins.resize(clock_bins.len(), 0.0);
        let total_clock = clock_bins.iter().sum();
        let total_busy = busy_bins.iter().sum();
        ScalerEstimator {
            config: config.clone(),
            prev: None,
            clock_bins,
            busy_bins,
            total_clock,
            total_busy,
            result: result.or(Some(ScalerResult {
                fractions: Vec::new(),
                errors: Vec::new(),
                average: 0.0,
                reduced_chi2: 0.0,
            })),
        }
    }

    /// Per-bin clock accumulators (persistence)
    pub fn clock_bins(&self) -> &[f64] {
        &self.clock_bins
    }

    /// Per-bin busy accumulators (persistence)
    pub fn busy_bins(&self) -> &[f64] {
        &self.busy_bins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DeadTimeConfig {
        DeadTimeConfig::default()
    }

    #[test]
    fn test_wrap_delta_monotonic() {
        assert_eq!(wrap_delta(100, 250), 150);
        assert_eq!(wrap_delta(0, 0), 0);
    }

    #[test]
    fn test_wrap_delta_wraparound() {
        // previous near the counter ceiling, current just past it
        assert_eq!(wrap_delta(4294967290, 5), (u64::from(u32::MAX) - 4294967290) + 5);
        assert_eq!(wrap_delta(4294967290, 5), 10);
        assert_eq!(wrap_delta(u32::MAX, 0), 0);
    }

    #[test]
    fn test_feed_accumulates_deltas() {
        let mut est = ScalerEstimator::new(&config());
        est.feed(0.5, 1000, 100);
        est.feed(1.5, 3000, 300); // +2000 clock, +200 busy into bin 0
        est.feed(12.0, 4000, 350); // +1000 clock, +50 busy into bin 1
        assert!(est.has_data());
        assert_eq!(est.clock_bins()[0], 2000.0);
        assert_eq!(est.busy_bins()[0], 200.0);
        assert_eq!(est.clock_bins()[1], 1000.0);
        assert_eq!(est.busy_bins()[1], 50.0);
    }

    #[test]
    fn test_first_event_only_seeds() {
        let mut est = ScalerEstimator::new(&config());
        est.feed(0.5, 123456, 999);
        assert!(!est.has_data());
        assert!(est.clock_bins().is_empty());
    }

    #[test]
    fn test_finalize_ratio_and_average() {
        let mut est = ScalerEstimator::new(&config());
        est.feed(0.1, 0, 0);
        est.feed(5.0, 10000, 1000);
        est.feed(15.0, 20000, 2000);
        est.finalize();
        let result = est.result().unwrap();
        assert!((result.average - 0.1).abs() < 1e-12);
        assert!((result.fractions[0] - 0.1).abs() < 1e-12);
        assert!((result.fractions[1] - 0.1).abs() < 1e-12);
        assert!(result.errors[0] > 0.0);
        // Perfectly uniform: no excess variance
        assert!(result.reduced_chi2 < 1e-12);
    }

    #[test]
    fn test_fraction_clamped_to_one() {
        let mut est = ScalerEstimator::new(&config());
        est.feed(0.1, 0, 0);
        est.feed(5.0, 100, 500); // busy ticks exceed clock ticks
        est.finalize();
        assert_eq!(est.result().unwrap().fractions[0], 1.0);
        assert_eq!(est.fraction(), 1.0);
    }

    #[test]
    fn test_empty_estimator_neutral() {
        let mut est = ScalerEstimator::new(&config());
        est.finalize();
        assert!(!est.has_data());
        assert_eq!(est.fraction(), 0.0);
        assert_eq!(est.fraction_at(100.0), 0.0);
        assert_eq!(est.result().unwrap().reduced_chi2, 0.0);
    }

    #[test]
    fn test_fraction_at_bin_lookup_and_fallback() {
        let mut est = ScalerEstimator::new(&config());
        est.feed(0.1, 0, 0);
        est.feed(5.0, 10000, 1000); // bin 0: 0.1
        est.feed(15.0, 30000, 5000); // bin 1: 0.2
        est.finalize();
        assert!((est.fraction_at(5.0) - 0.1).abs() < 1e-12);
        assert!((est.fraction_at(15.0) - 0.2).abs() < 1e-12);
        // Outside accumulated bins: run average
        let avg = est.result().unwrap().average;
        assert!((est.fraction_at(500.0) - avg).abs() < 1e-12);
    }

    #[test]
    fn test_nonuniform_dead_time_large_chi2() {
        let mut est = ScalerEstimator::new(&config());
        est.feed(0.1, 0, 0);
        let mut clock = 0u32;
        let mut busy = 0u32;
        for bin in 0..10 {
            clock += 1_000_000;
            // Half the run at 1%, half at 60% dead
            busy += if bin < 5 { 10_000 } else { 600_000 };
            est.feed(bin as f64 * 10.0 + 5.0, clock, busy);
        }
        est.finalize();
        assert!(est.result().unwrap().reduced_chi2 > 100.0);
    }

    #[test]
    fn test_from_parts_missing_accumulators_neutral() {
        let est = ScalerEstimator::from_parts(&config(), None, None, None);
        assert!(!est.has_data());
        assert_eq!(est.fraction(), 0.0);
    }
}
