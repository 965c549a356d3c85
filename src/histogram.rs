//! Fixed-binning histograms for dead-time estimation
//!
//! Both dead-time methods accumulate into plain linear-binned histograms: a
//! 1-D Δt histogram for the inter-event-difference fit and a 2-D
//! (Δt × run-time) histogram for time-resolved fits. Counts are `f64` so the
//! same types round-trip through persisted snapshots without conversion.

use serde::{Deserialize, Serialize};

/// 1-D histogram with fixed linear binning over `[lo, hi)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist1D {
    lo: f64,
    hi: f64,
    bins: Vec<f64>,
    underflow: f64,
    overflow: f64,
}

impl Hist1D {
    /// Create a histogram with `nbins` equal-width bins over `[lo, hi)`
    ///
    /// `nbins` of zero or a degenerate range collapses to a single bin so
    /// that fills never index out of bounds.
    pub fn new(nbins: usize, lo: f64, hi: f64) -> Self {
        let nbins = nbins.max(1);
        let (lo, hi) = if hi > lo { (lo, hi) } else { (lo, lo + 1.0) };
        Hist1D {
            lo,
            hi,
            bins: vec![0.0; nbins],
            underflow: 0.0,
            overflow: 0.0,
        }
    }

    pub fn nbins(&self) -> usize {
        self.bins.len()
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    pub fn bin_width(&self) -> f64 {
        (self.hi - self.lo) / self.bins.len() as f64
    }

    /// Bin index for a value, or None if outside `[lo, hi)`
    pub fn bin_index(&self, x: f64) -> Option<usize> {
        if x < self.lo || x >= self.hi || !x.is_finite() {
            return None;
        }
        let idx = ((x - self.lo) / self.bin_width()) as usize;
        // Upper-edge rounding can land exactly on nbins
        Some(idx.min(self.bins.len() - 1))
    }

    /// Center of bin `i`
    pub fn bin_center(&self, i: usize) -> f64 {
        self.lo + (i as f64 + 0.5) * self.bin_width()
    }

    /// Lower edge of bin `i`
    pub fn bin_low_edge(&self, i: usize) -> f64 {
        self.lo + i as f64 * self.bin_width()
    }

    pub fn bin_count(&self, i: usize) -> f64 {
        self.bins.get(i).copied().unwrap_or(0.0)
    }

    pub fn counts(&self) -> &[f64] {
        &self.bins
    }

    /// Add one entry at `x`; out-of-range entries go to under/overflow
    pub fn fill(&mut self, x: f64) {
        self.fill_weighted(x, 1.0);
    }

    pub fn fill_weighted(&mut self, x: f64, w: f64) {
        match self.bin_index(x) {
            Some(i) => self.bins[i] += w,
            None if x < self.lo => self.underflow += w,
            None => self.overflow += w,
        }
    }

    /// Total in-range entries (SIMD-accelerated sum)
    pub fn entries(&self) -> f64 {
        let counts: Vec<f32> = self.bins.iter().map(|&c| c as f32).collect();
        f64::from(trueno::Vector::from_slice(&counts).sum().unwrap_or(0.0))
    }

    pub fn underflow(&self) -> f64 {
        self.underflow
    }

    pub fn overflow(&self) -> f64 {
        self.overflow
    }

    /// Count-weighted mean bin index, or None for an empty histogram
    pub fn mean_occupied_bin(&self) -> Option<usize> {
        let total: f64 = self.bins.iter().sum();
        if total <= 0.0 {
            return None;
        }
        let weighted: f64 = self
            .bins
            .iter()
            .enumerate()
            .map(|(i, &c)| i as f64 * c)
            .sum();
        Some((weighted / total).round() as usize)
    }

    /// Index of the first bin with a non-zero count
    pub fn first_occupied_bin(&self) -> Option<usize> {
        self.bins.iter().position(|&c| c > 0.0)
    }
}

/// 2-D histogram with fixed linear binning on both axes, row-major in y
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist2D {
    x_lo: f64,
    x_hi: f64,
    x_bins: usize,
    y_lo: f64,
    y_hi: f64,
    y_bins: usize,
    bins: Vec<f64>,
}

impl Hist2D {
    pub fn new(x_bins: usize, x_lo: f64, x_hi: f64, y_bins: usize, y_lo: f64, y_hi: f64) -> Self {
        let x_bins = x_bins.max(1);
        let y_bins = y_bins.max(1);
        let (x_lo, x_hi) = if x_hi > x_lo {
            (x_lo, x_hi)
        } else {
            (x_lo, x_lo + 1.0)
        };
        let (y_lo, y_hi) = if y_hi > y_lo {
            (y_lo, y_hi)
        } else {
            (y_lo, y_lo + 1.0)
        };
        Hist2D {
            x_lo,
            x_hi,
            x_bins,
            y_lo,
            y_hi,
            y_bins,
            bins: vec![0.0; x_bins * y_bins],
        }
    }

    pub fn x_bins(&self) -> usize {
        self.x_bins
    }

    pub fn y_bins(&self) -> usize {
        self.y_bins
    }

    fn x_index(&self, x: f64) -> Option<usize> {
        if x < self.x_lo || x >= self.x_hi || !x.is_finite() {
            return None;
        }
        let w = (self.x_hi - self.x_lo) / self.x_bins as f64;
        Some((((x - self.x_lo) / w) as usize).min(self.x_bins - 1))
    }

    fn y_index(&self, y: f64) -> Option<usize> {
        if y < self.y_lo || y >= self.y_hi || !y.is_finite() {
            return None;
        }
        let w = (self.y_hi - self.y_lo) / self.y_bins as f64;
        Some((((y - self.y_lo) / w) as usize).min(self.y_bins - 1))
    }

    /// Center of y-bin `j`
    pub fn y_center(&self, j: usize) -> f64 {
        let w = (self.y_hi - self.y_lo) / self.y_bins as f64;
        self.y_lo + (j as f64 + 0.5) * w
    }

    /// y-bin index for a value, or None if outside the y range
    pub fn y_bin_for(&self, y: f64) -> Option<usize> {
        self.y_index(y)
    }

    /// Add one entry at `(x, y)`; out-of-range entries are dropped
    pub fn fill(&mut self, x: f64, y: f64) {
        if let (Some(i), Some(j)) = (self.x_index(x), self.y_index(y)) {
            self.bins[j * self.x_bins + i] += 1.0;
        }
    }

    /// Project the x distribution of y-slice `j` into a `Hist1D`
    pub fn x_slice(&self, j: usize) -> Hist1D {
        let mut slice = Hist1D::new(self.x_bins, self.x_lo, self.x_hi);
        if j < self.y_bins {
            for i in 0..self.x_bins {
                slice.bins[i] = self.bins[j * self.x_bins + i];
            }
        }
        slice
    }

    pub fn entries(&self) -> f64 {
        let counts: Vec<f32> = self.bins.iter().map(|&c| c as f32).collect();
        f64::from(trueno::Vector::from_slice(&counts).sum().unwrap_or(0.0))
    }
}
