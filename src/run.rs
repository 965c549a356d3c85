//! Per-run orchestration: one mask, one estimator, one pass
//!
//! `RunQuality` owns the mask/estimator pair for a single run, feeds them
//! event by event, finalizes exactly once after the stream ends, and
//! produces the run-quality summary external consumers read.

use crate::config::AnalysisConfig;
use crate::deadtime::{DeadTimeEstimator, ReconcileStatus};
use crate::event::EventRecord;
use crate::exposure;
use crate::gti::{self, Gti, GtiParams};
use crate::mask::TimeMask;
use crate::time::ObsTime;
use serde::Serialize;
use std::path::Path;

/// Run-quality analysis for one observation run
#[derive(Debug)]
pub struct RunQuality {
    config: AnalysisConfig,
    mask: TimeMask,
    deadtime: DeadTimeEstimator,
}

impl RunQuality {
    /// Build the per-run state; never fails (bad bounds degrade the mask)
    pub fn new(
        run_id: u32,
        start: ObsTime,
        end: ObsTime,
        config: &AnalysisConfig,
        override_path: Option<&Path>,
    ) -> Self {
        let mask = TimeMask::with_overrides(run_id, start, end, override_path);
        let duration = match mask.span() {
            crate::mask::MaskSpan::Bounded { size } => size as f64,
            crate::mask::MaskSpan::Unbounded => crate::mask::MAX_RUN_SECONDS,
        };
        RunQuality {
            deadtime: DeadTimeEstimator::new(&config.deadtime, duration),
            mask,
            config: config.clone(),
        }
    }

    /// Single-pass update for one event; returns the mask's admission
    ///
    /// Admitted events feed both dead-time methods; rejected events touch
    /// only the mask bookkeeping.
    pub fn ingest(&mut self, event: &EventRecord) -> bool {
        let admitted = self.mask.check(event.time);
        if admitted {
            if let Some(start) = self.mask.start_time() {
                self.deadtime
                    .feed(event.time.seconds_since(start), event.counters);
            }
        }
        admitted
    }

    /// Record a science-counted event (rate reporting only)
    pub fn record_counted(&mut self, time: ObsTime) {
        self.mask.count_on(time);
    }

    /// Run the dead-time fits; idempotent
    pub fn finalize(&mut self) {
        self.deadtime.finalize();
    }

    pub fn mask(&self) -> &TimeMask {
        &self.mask
    }

    pub fn deadtime(&self) -> &DeadTimeEstimator {
        &self.deadtime
    }

    /// Extract GTIs over the whole run span
    ///
    /// The configured step is widened when the span is too long for the
    /// sample budget, keeping the scan bounded while covering the full run.
    pub fn extract_gtis(&self) -> Vec<Gti> {
        let span = exposure::nominal_duration(&self.mask) as f64;
        if span <= 0.0 {
            return Vec::new();
        }
        let params = self.bounded_gti_params(span);
        gti::extract(&self.mask, &params, 0.0, span)
    }

    fn bounded_gti_params(&self, span: f64) -> GtiParams {
        let configured = &self.config.gti;
        let min_step = span / (0.8 * configured.max_samples as f64);
        GtiParams {
            step: configured.step.max(min_step),
            max_samples: configured.max_samples,
        }
    }

    /// Produce the run summary; call after [`RunQuality::finalize`]
    pub fn summary(&self, prefer_tdiff: bool) -> RunSummary {
        let estimate = self.deadtime.compute();
        RunSummary {
            run_id: self.mask.run_id(),
            start_mjd: self.mask.start_time().map(|t| t.as_mjd()),
            nominal_duration_s: exposure::nominal_duration(&self.mask),
            effective_duration_s: self.mask.effective_duration(),
            out_of_domain_events: self.mask.out_of_domain(),
            overrides_applied: self.mask.overrides_applied(),
            tdiff_fraction: estimate.tdiff_fraction,
            scalar_fraction: estimate.scalar_fraction,
            deadtime_fraction: estimate.overall,
            deadtime_status: estimate.status,
            scaler_reduced_chi2: self
                .deadtime
                .scaler()
                .result()
                .map_or(0.0, |r| r.reduced_chi2),
            livetime_s: exposure::effective_livetime(&self.mask, &self.deadtime, prefer_tdiff),
            mean_observation_mjd: exposure::mean_observation_mjd(&self.mask),
            gtis: self.extract_gtis(),
        }
    }
}

/// Serializable run-quality summary
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_mjd: Option<f64>,
    pub nominal_duration_s: usize,
    pub effective_duration_s: usize,
    pub out_of_domain_events: u64,
    pub overrides_applied: bool,
    pub tdiff_fraction: f64,
    pub scalar_fraction: f64,
    pub deadtime_fraction: f64,
    pub deadtime_status: ReconcileStatus,
    pub scaler_reduced_chi2: f64,
    pub livetime_s: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_observation_mjd: Option<f64>,
    pub gtis: Vec<Gti>,
}

impl RunSummary {
    /// Generate human-readable report
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();

        report.push_str(&format!("=== Run {} quality summary ===\n\n", self.run_id));
        if let Some(mjd) = self.start_mjd {
            report.push_str(&format!("Start:                MJD {:.6}\n", mjd));
        }
        report.push_str(&format!(
            "Nominal duration:     {} s\n",
            self.nominal_duration_s
        ));
        report.push_str(&format!(
            "Mask-open duration:   {} s\n",
            self.effective_duration_s
        ));
        report.push_str(&format!("Livetime:             {:.2} s\n", self.livetime_s));
        if let Some(mjd) = self.mean_observation_mjd {
            report.push_str(&format!("Mean observation:     MJD {:.6}\n", mjd));
        }

        match self.deadtime_status {
            ReconcileStatus::Consistent => {
                report.push_str(&format!(
                    "\n✅ Dead time {:.4} (scalar, confirmed by tdiff {:.4})\n",
                    self.deadtime_fraction, self.tdiff_fraction
                ));
            }
            ReconcileStatus::Inconsistent => {
                report.push_str(&format!(
                    "\n⚠️  Dead time {:.4} (tdiff fallback; scalar read {:.4})\n",
                    self.deadtime_fraction, self.scalar_fraction
                ));
            }
        }
        report.push_str(&format!(
            "Scalar reduced χ²:    {:.2}\n",
            self.scaler_reduced_chi2
        ));

        if self.out_of_domain_events > 0 {
            report.push_str(&format!(
                "⚠️  {} events fell outside the run window\n",
                self.out_of_domain_events
            ));
        }
        if !self.overrides_applied {
            report.push_str("(no mask override file applied)\n");
        }

        if !self.gtis.is_empty() {
            report.push_str(&format!("\nGood Time Intervals ({}):\n", self.gtis.len()));
            for gti in &self.gtis {
                report.push_str(&format!(
                    "  [{:10.3}, {:10.3}]  {:.3} s\n",
                    gti.begin,
                    gti.end,
                    gti.duration()
                ));
            }
        }

        report
    }
}
