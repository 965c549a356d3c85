//! Effective exposure from mask and dead time
//!
//! The only two numbers external consumers need from this crate: the
//! effective livetime (open seconds corrected second-by-second for dead
//! time) and the open-weighted mean observation epoch in MJD day units,
//! both over an already-finalized mask/estimator pair.

use crate::deadtime::DeadTimeEstimator;
use crate::mask::{MaskSpan, MeanTimeKind, TimeMask};
use crate::time::SECONDS_PER_DAY;

/// Effective livetime in seconds: Σ over open seconds of (1 − dead(t))
///
/// Each open second is queried at its midpoint. With `prefer_tdiff` the
/// run-average tdiff fraction applies uniformly; otherwise the scalar
/// per-bin fraction provides the time dependence.
pub fn effective_livetime(
    mask: &TimeMask,
    deadtime: &DeadTimeEstimator,
    prefer_tdiff: bool,
) -> f64 {
    let mut livetime = 0.0;
    for s in 0..mask.len() {
        if mask.is_open_second(s) {
            livetime += 1.0 - deadtime.fraction_at(s as f64 + 0.5, prefer_tdiff);
        }
    }
    livetime
}

/// Open-weighted mean observation epoch as a decimal MJD day
///
/// None when the mask has no open second or no start frame (an unbounded
/// mask that never saw an event).
pub fn mean_observation_mjd(mask: &TimeMask) -> Option<f64> {
    let start = mask.start_time()?;
    let offset = mask.mean_time(MeanTimeKind::MaskWeighted);
    if offset < 0.0 {
        return None;
    }
    Some(start.offset(offset).as_mjd())
}

/// Nominal duration in seconds: the bounded window size, or the grown
/// storage length of an unbounded mask
pub fn nominal_duration(mask: &TimeMask) -> usize {
    match mask.span() {
        MaskSpan::Bounded { size } => size,
        MaskSpan::Unbounded => mask.len(),
    }
}
