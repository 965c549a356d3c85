// Tests for the paired dead-time estimator and its reconciliation
//
// Scenarios mirror operations: a Poisson event stream with a fixed dead
// period per event, matching (or deliberately mismatched) hardware scalar
// counters, and degraded inputs (one method absent, near-empty bins).

use super::*;
use crate::mask::TimeMask;
use crate::time::ObsTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn config() -> DeadTimeConfig {
    DeadTimeConfig::default()
}

/// Feed a synthetic Poisson stream with dead period `dead` seconds and mean
/// spacing `mean_dt`; scalar counters carry busy/clock ratio `ratio`.
///
/// Spacing is `dead + Exp(mean_dt − dead)` from a seeded generator, the
/// spectrum a paralyzable DAQ actually produces.
fn feed_synthetic(
    est: &mut DeadTimeEstimator,
    n: usize,
    dead: f64,
    mean_dt: f64,
    ratio: Option<f64>,
) {
    let mut rng = StdRng::seed_from_u64(42);
    let tau = mean_dt - dead;
    let mut t = 0.0;
    let mut clock = 4294960000u32; // a few wraps during the run
    let mut busy = 0u32;
    for _ in 0..n {
        let u: f64 = rng.gen();
        let dt = dead - tau * (1.0 - u).ln();
        t += dt;
        let counters = ratio.map(|r| {
            let ticks = (dt * 1.0e7) as u32;
            clock = clock.wrapping_add(ticks);
            busy = busy.wrapping_add((f64::from(ticks) * r) as u32);
            (clock, busy)
        });
        est.feed(t, counters);
    }
}

#[test]
fn test_consistent_when_methods_agree() {
    let mut est = DeadTimeEstimator::new(&config(), 3600.0);
    // 5 ms dead period, ~20 Hz stream, scalars carrying the matching ratio
    let model = 1.0 - (-0.005f64 / 0.045).exp();
    feed_synthetic(&mut est, 50000, 0.005, 0.05, Some(model));
    est.finalize();

    let estimate = est.compute();
    assert_eq!(estimate.status, ReconcileStatus::Consistent);
    assert_eq!(estimate.overall, estimate.scalar_fraction);
    assert!(
        (estimate.scalar_fraction - model).abs() < 0.02,
        "scalar fraction {} should sit near {}",
        estimate.scalar_fraction,
        model
    );
    assert!(
        (estimate.tdiff_fraction - model).abs() < 0.05,
        "tdiff fraction {} should sit near {}",
        estimate.tdiff_fraction,
        model
    );
}

#[test]
fn test_inconsistent_when_methods_disagree() {
    let mut est = DeadTimeEstimator::new(&config(), 3600.0);
    // Scalars claim 60% dead while the event spacing shows ~10%
    feed_synthetic(&mut est, 20000, 0.005, 0.05, Some(0.6));
    est.finalize();

    let estimate = est.compute();
    assert_eq!(estimate.status, ReconcileStatus::Inconsistent);
    assert_eq!(estimate.overall, estimate.tdiff_fraction);
}

#[test]
fn test_inconsistent_without_scalar_data() {
    let mut est = DeadTimeEstimator::new(&config(), 3600.0);
    feed_synthetic(&mut est, 20000, 0.005, 0.05, None);
    est.finalize();

    let estimate = est.compute();
    assert_eq!(estimate.status, ReconcileStatus::Inconsistent);
    assert_eq!(estimate.scalar_fraction, 0.0);
    assert_eq!(estimate.overall, estimate.tdiff_fraction);
}

#[test]
fn test_compute_on_empty_run_is_neutral() {
    let mut est = DeadTimeEstimator::new(&config(), 3600.0);
    est.finalize();
    let estimate = est.compute();
    assert_eq!(estimate.tdiff_fraction, 0.0);
    assert_eq!(estimate.scalar_fraction, 0.0);
    assert_eq!(estimate.overall, 0.0);
    assert_eq!(estimate.status, ReconcileStatus::Inconsistent);
}

#[test]
fn test_fractions_always_in_unit_interval() {
    let mut est = DeadTimeEstimator::new(&config(), 3600.0);
    feed_synthetic(&mut est, 5000, 0.02, 0.03, Some(0.9));
    est.finalize();
    let estimate = est.compute();
    for f in [
        estimate.tdiff_fraction,
        estimate.scalar_fraction,
        estimate.overall,
    ] {
        assert!((0.0..=1.0).contains(&f), "fraction {} out of [0,1]", f);
    }
}

#[test]
fn test_fraction_at_prefers_tdiff_run_average() {
    let mut est = DeadTimeEstimator::new(&config(), 3600.0);
    feed_synthetic(&mut est, 20000, 0.005, 0.05, Some(0.1));
    est.finalize();
    let tdiff_avg = est.tdiff().fraction();
    // prefer_tdiff ignores time entirely
    assert_eq!(est.fraction_at(10.0, true), tdiff_avg);
    assert_eq!(est.fraction_at(900.0, true), tdiff_avg);
}

#[test]
fn test_fraction_at_scalar_branch_uses_bins() {
    let mut est = DeadTimeEstimator::new(&config(), 3600.0);
    feed_synthetic(&mut est, 20000, 0.005, 0.05, Some(0.1));
    est.finalize();
    let f = est.fraction_at(10.0, false);
    assert!((f - 0.1).abs() < 0.03, "scalar bin fraction {} near 0.1", f);
}

#[test]
fn test_degenerate_scalar_bin_falls_back_to_tdiff() {
    let mut est = DeadTimeEstimator::new(&config(), 3600.0);
    feed_synthetic(&mut est, 20000, 0.005, 0.05, None);
    // One isolated, nearly-dead scalar bin far into the run
    est.feed(2000.0, Some((0, 0)));
    est.feed(2000.5, Some((1000, 999)));
    est.finalize();

    let tdiff_avg = est.tdiff().fraction();
    let queried = est.fraction_at(2000.0, false);
    assert_eq!(
        queried, tdiff_avg,
        "a bin reading {} should be discarded for the tdiff average",
        est.scaler().fraction_at(2000.0)
    );
}

#[test]
fn test_fraction_over_mask_averages_open_seconds() {
    let mut est = DeadTimeEstimator::new(&config(), 100.0);
    feed_synthetic(&mut est, 2000, 0.005, 0.05, Some(0.1));
    est.finalize();

    let start = ObsTime::from_mjd_parts(58000, 0.0);
    let mask = TimeMask::new(1, start, start.offset(100.0));
    let avg = est.fraction_over(&mask, false);
    assert!((0.0..=1.0).contains(&avg));

    // Fully closed mask: run-average fallback
    let mut closed = TimeMask::new(1, start, start.offset(100.0));
    closed.set_range(0.0, 100.0, false);
    let fallback = est.fraction_over(&closed, false);
    assert_eq!(fallback, est.scaler().fraction());
}

#[test]
fn test_feed_after_finalize_ignored() {
    let mut est = DeadTimeEstimator::new(&config(), 3600.0);
    feed_synthetic(&mut est, 100, 0.005, 0.05, None);
    est.finalize();
    let entries = est.tdiff().histogram().entries();
    est.feed(999.0, None);
    assert_eq!(est.tdiff().histogram().entries(), entries);
}

#[test]
fn test_estimate_serializes() {
    let mut est = DeadTimeEstimator::new(&config(), 3600.0);
    feed_synthetic(&mut est, 1000, 0.005, 0.05, Some(0.1));
    est.finalize();
    let estimate = est.compute();
    let json = serde_json::to_string(&estimate).unwrap();
    let back: DeadTimeEstimate = serde_json::from_str(&json).unwrap();
    assert_eq!(estimate, back);
}
