//! GTI boundary-search benchmark
//!
//! The scan is O(window / step); this tracks the per-probe cost so the
//! default step/budget pairing stays inside an interactive analysis.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench gti_scan
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lapso::gti::{extract, GtiParams};
use lapso::mask::TimeMask;
use lapso::time::ObsTime;

fn start() -> ObsTime {
    ObsTime::from_mjd_parts(58000, 0.0)
}

/// Mask with a closed block every 120 s
fn blocky_mask(span: f64) -> TimeMask {
    let mut mask = TimeMask::new(1, start(), start().offset(span));
    let mut sec = 60.0;
    while sec < span {
        mask.set_range(sec, 30.0, false);
        sec += 120.0;
    }
    mask
}

fn bench_gti_extract(c: &mut Criterion) {
    let mask = blocky_mask(1800.0);
    let mut group = c.benchmark_group("gti_extract");
    for step in [0.01, 0.001] {
        let params = GtiParams {
            step,
            max_samples: 10_000_000,
        };
        group.bench_with_input(BenchmarkId::from_parameter(step), &params, |b, params| {
            b.iter(|| black_box(extract(&mask, params, 0.0, 1800.0)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_gti_extract);
criterion_main!(benches);
