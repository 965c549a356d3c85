//! Weighted exponential fit over a Δt histogram
//!
//! For Poisson arrivals the inter-event-difference spectrum above the dead
//! threshold is exponential, so `ln(count)` is linear in Δt. The fit is a
//! closed-form weighted least squares of `ln(n_i)` on the bin centers with
//! weight `n_i` (the large-count variance of `ln n` is `1/n`), returning the
//! intercept/slope pair and their covariance. No shared state; safely
//! reentrant across runs.

use crate::histogram::Hist1D;
use serde::{Deserialize, Serialize};

/// Result of an exponential fit `ln(count) ≈ intercept + slope · Δt`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpFit {
    pub intercept: f64,
    /// Slope in 1/seconds; negative for a decaying spectrum
    pub slope: f64,
    /// 2×2 covariance of (intercept, slope)
    pub covariance: [[f64; 2]; 2],
    /// Fit chi-square over the window
    pub chi2: f64,
    /// Degrees of freedom (occupied bins − 2)
    pub ndf: usize,
}

impl ExpFit {
    /// One-sigma uncertainty of the slope
    pub fn slope_error(&self) -> f64 {
        self.covariance[1][1].max(0.0).sqrt()
    }
}

/// Fit `ln(count)` vs. Δt over `[lo, hi]` of the histogram
///
/// Only occupied bins enter the fit. Returns None when fewer than three
/// occupied bins fall inside the window (slope and its error would be
/// meaningless).
pub fn fit_exponential(hist: &Hist1D, lo: f64, hi: f64) -> Option<ExpFit> {
    // Accumulate weighted normal-equation sums
    let mut s_w = 0.0;
    let mut s_x = 0.0;
    let mut s_y = 0.0;
    let mut s_xx = 0.0;
    let mut s_xy = 0.0;
    let mut points: Vec<(f64, f64, f64)> = Vec::new();

    for i in 0..hist.nbins() {
        let x = hist.bin_center(i);
        if x < lo || x > hi {
            continue;
        }
        let n = hist.bin_count(i);
        if n <= 0.0 {
            continue;
        }
        let y = n.ln();
        let w = n;
        s_w += w;
        s_x += w * x;
        s_y += w * y;
        s_xx += w * x * x;
        s_xy += w * x * y;
        points.push((x, y, w));
    }

    if points.len() < 3 {
        return None;
    }

    let det = s_w * s_xx - s_x * s_x;
    if det.abs() < f64::EPSILON {
        return None;
    }

    let intercept = (s_xx * s_y - s_x * s_xy) / det;
    let slope = (s_w * s_xy - s_x * s_y) / det;

    // Covariance of the weighted estimator
    let covariance = [
        [s_xx / det, -s_x / det],
        [-s_x / det, s_w / det],
    ];

    let chi2: f64 = points
        .iter()
        .map(|&(x, y, w)| {
            let r = y - (intercept + slope * x);
            w * r * r
        })
        .sum();

    Some(ExpFit {
        intercept,
        slope,
        covariance,
        chi2,
        ndf: points.len() - 2,
    })
}
