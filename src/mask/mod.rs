//! Per-second time mask: the admission oracle for one observation run
//!
//! The mask answers, for every event of a run, "does this second contain
//! trustworthy data?". It owns the per-second checked/accepted/counted
//! bookkeeping that downstream rate and exposure calculations consume, and
//! supports file-based open/close overrides for seconds flagged by hand.
//!
//! Invalid run bounds never fail construction: the mask degrades to an
//! unbounded accept-all span that grows on demand, framed by the first
//! checked event. The degraded path is an explicit `MaskSpan` variant so it
//! stays directly testable.

mod overrides;


pub use overrides::{parse_override_line, OverrideLine};

use crate::time::ObsTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Longest run duration accepted as a bounded mask, in seconds
pub const MAX_RUN_SECONDS: f64 = 86400.0;

/// Out-of-domain events per run tolerated before an aggregate warning
pub const OUT_OF_DOMAIN_WARN_THRESHOLD: u64 = 2;

/// Span behavior of a mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskSpan {
    /// Fixed window of `size` whole seconds from the run start
    Bounded { size: usize },
    /// Accept-all fallback: grows forward on demand from the first checked
    /// event (entered when the configured run bounds are unusable)
    Unbounded,
}

/// Weighting applied by [`TimeMask::mean_time`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeanTimeKind {
    /// Every second of the span weighted equally (run midpoint)
    RunMidpoint,
    /// Open seconds weighted equally
    MaskWeighted,
    /// Weighted by events checked per second
    CheckedWeighted,
    /// Weighted by events accepted per second
    AcceptedWeighted,
}

/// One chunk of [`TimeMask::interval_rates`] output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalRate {
    /// Science-counted events in the chunk
    pub counted: u64,
    /// Open-second-weighted mean time of the chunk (seconds from run start),
    /// or the chunk midpoint when no second is open
    pub mean_time: f64,
    /// Open seconds in the chunk
    pub open_seconds: usize,
}

/// Persisted mask state: span, bit-packed open flags, checked/accepted counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskSnapshot {
    pub run_id: u32,
    pub span: MaskSpan,
    pub start_seconds: Option<f64>,
    pub len: usize,
    pub mask_bits: Vec<u8>,
    pub checked: Vec<u64>,
    pub accepted: Vec<u64>,
}

/// Per-second admission oracle for one run
#[derive(Debug, Clone)]
pub struct TimeMask {
    run_id: u32,
    span: MaskSpan,
    start_time: Option<ObsTime>,
    open: Vec<bool>,
    checked: Vec<u64>,
    accepted: Vec<u64>,
    counted: Vec<u64>,
    out_of_domain: u64,
    overrides_applied: bool,
}

impl TimeMask {
    /// Build the mask for one run window
    ///
    /// A window with `end < start` or longer than [`MAX_RUN_SECONDS`] is a
    /// configuration defect: the mask logs it and degrades to
    /// [`MaskSpan::Unbounded`], admitting everything and framing itself on
    /// the first checked event. Construction never fails.
    pub fn new(run_id: u32, start: ObsTime, end: ObsTime) -> Self {
        let duration = end.seconds_since(start);
        if !duration.is_finite() || duration < 0.0 || duration > MAX_RUN_SECONDS {
            tracing::warn!(
                run_id,
                duration,
                "unusable run bounds, mask degrades to unbounded accept-all"
            );
            return TimeMask {
                run_id,
                span: MaskSpan::Unbounded,
                start_time: None,
                open: Vec::new(),
                checked: Vec::new(),
                accepted: Vec::new(),
                counted: Vec::new(),
                out_of_domain: 0,
                overrides_applied: false,
            };
        }

        let size = duration.ceil() as usize;
        TimeMask {
            run_id,
            span: MaskSpan::Bounded { size },
            start_time: Some(start),
            open: vec![true; size],
            checked: vec![0; size],
            accepted: vec![0; size],
            counted: vec![0; size],
            out_of_domain: 0,
            overrides_applied: false,
        }
    }

    /// Build the mask and apply an override file when a path is given
    pub fn with_overrides(
        run_id: u32,
        start: ObsTime,
        end: ObsTime,
        override_path: Option<&Path>,
    ) -> Self {
        let mut mask = TimeMask::new(run_id, start, end);
        if let Some(path) = override_path {
            mask.apply_overrides(path);
        }
        mask
    }

    pub fn run_id(&self) -> u32 {
        self.run_id
    }

    pub fn span(&self) -> MaskSpan {
        self.span
    }

    pub fn is_unbounded(&self) -> bool {
        self.span == MaskSpan::Unbounded
    }

    /// Run start: the configured start, or for an unbounded mask the first
    /// checked instant (None until one arrives)
    pub fn start_time(&self) -> Option<ObsTime> {
        self.start_time
    }

    /// Current length of the per-second storage
    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Events that fell outside the bounded window
    pub fn out_of_domain(&self) -> u64 {
        self.out_of_domain
    }

    /// Whether the last override file was read and applied cleanly
    pub fn overrides_applied(&self) -> bool {
        self.overrides_applied
    }

    /// Apply open/close overrides from a plain-text file
    ///
    /// Data lines have the form `*<run_id> <start_sec> <width_sec> <mode>`
    /// with mode 0 closing and mode 1 opening the clipped sub-range; all
    /// other lines are ignored. Returns the number of lines applied. An
    /// unreadable file logs a warning and leaves the mask untouched.
    pub fn apply_overrides(&mut self, path: &Path) -> usize {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    run_id = self.run_id,
                    path = %path.display(),
                    error = %e,
                    "time-mask override file unreadable, mask left as built"
                );
                self.overrides_applied = false;
                return 0;
            }
        };

        let mut applied = 0;
        for line in text.lines() {
            let Some(entry) = parse_override_line(line) else {
                continue;
            };
            if entry.run_id != self.run_id {
                continue;
            }
            self.set_range(entry.start_sec, entry.width_sec, entry.open);
            applied += 1;
        }
        self.overrides_applied = true;
        tracing::debug!(run_id = self.run_id, applied, "time-mask overrides applied");
        applied
    }

    /// Open or close `[start_sec, start_sec + width_sec)`, clipped to storage
    pub fn set_range(&mut self, start_sec: f64, width_sec: f64, open: bool) {
        if self.open.is_empty() || !start_sec.is_finite() || !width_sec.is_finite() {
            return;
        }
        let lo = start_sec.max(0.0).floor() as usize;
        let hi = ((start_sec + width_sec).ceil().max(0.0) as usize).min(self.open.len());
        for flag in self.open.iter_mut().take(hi).skip(lo) {
            *flag = open;
        }
    }

    /// Second offset of `t` from the run start, or None with no frame yet
    fn second_offset(&self, t: ObsTime) -> Option<i64> {
        self.start_time.map(|start| t.seconds_since(start).floor() as i64)
    }

    /// Test and record one event against the mask
    ///
    /// Bounded masks tally the event into `checked[s]` (and `accepted[s]`
    /// when the second is open) and return the second's state; events
    /// outside the window only bump the out-of-domain aggregate. Unbounded
    /// masks admit everything, growing storage as needed.
    pub fn check(&mut self, t: ObsTime) -> bool {
        match self.span {
            MaskSpan::Unbounded => {
                if self.start_time.is_none() {
                    tracing::debug!(
                        run_id = self.run_id,
                        start = t.as_seconds(),
                        "unbounded mask framed by first checked event"
                    );
                    self.start_time = Some(t);
                }
                let Some(offset) = self.second_offset(t) else {
                    return true;
                };
                if offset < 0 {
                    // Before the first-event frame; admitted but not binnable
                    self.note_out_of_domain();
                    return true;
                }
                let s = offset as usize;
                if s >= self.open.len() {
                    self.grow_to(s + 1);
                }
                self.checked[s] += 1;
                self.open[s] = true;
                self.accepted[s] += 1;
                true
            }
            MaskSpan::Bounded { size } => {
                let Some(offset) = self.second_offset(t) else {
                    return false;
                };
                if offset < 0 || offset as usize >= size {
                    self.note_out_of_domain();
                    return false;
                }
                let s = offset as usize;
                self.checked[s] += 1;
                if self.open[s] {
                    self.accepted[s] += 1;
                }
                self.open[s]
            }
        }
    }

    /// Record a science-counted event (no mask gating)
    ///
    /// Used for event-rate reporting only; the mask itself never consults
    /// these counts. Out-of-window times are a silent no-op.
    pub fn count_on(&mut self, t: ObsTime) {
        let Some(offset) = self.second_offset(t) else {
            return;
        };
        if offset < 0 {
            return;
        }
        let s = offset as usize;
        if s >= self.counted.len() {
            if self.is_unbounded() {
                self.grow_to(s + 1);
            } else {
                return;
            }
        }
        self.counted[s] += 1;
    }

    /// Read-only admission query; never mutates counters
    ///
    /// Used by the GTI extractor and exposure integration over a finalized
    /// mask. Unbounded masks report open at and after their start frame.
    pub fn is_open(&self, t: ObsTime) -> bool {
        match self.span {
            MaskSpan::Unbounded => {
                self.second_offset(t).is_some_and(|offset| offset >= 0)
            }
            MaskSpan::Bounded { .. } => {
                let Some(offset) = self.second_offset(t) else {
                    return false;
                };
                offset >= 0 && self.is_open_second(offset as usize)
            }
        }
    }

    /// State of whole second `s` from the run start
    pub fn is_open_second(&self, s: usize) -> bool {
        self.open.get(s).copied().unwrap_or(false)
    }

    /// Number of open seconds
    pub fn effective_duration(&self) -> usize {
        self.open.iter().filter(|&&o| o).count()
    }

    /// Weighted mean time in seconds from the run start
    ///
    /// Each whole second contributes its midpoint `t + 0.5` with the weight
    /// selected by `kind`. Returns the −1.0 sentinel when no weight exists.
    pub fn mean_time(&self, kind: MeanTimeKind) -> f64 {
        let mut num = 0.0;
        let mut den = 0.0;
        for t in 0..self.open.len() {
            let w = match kind {
                MeanTimeKind::RunMidpoint => 1.0,
                MeanTimeKind::MaskWeighted => {
                    if self.open[t] {
                        1.0
                    } else {
                        0.0
                    }
                }
                MeanTimeKind::CheckedWeighted => self.checked[t] as f64,
                MeanTimeKind::AcceptedWeighted => self.accepted[t] as f64,
            };
            num += w * (t as f64 + 0.5);
            den += w;
        }
        if den > 0.0 {
            num / den
        } else {
            -1.0
        }
    }

    /// Partition the span into `width`-second chunks and report, per chunk:
    /// science counts, open-weighted mean time (chunk midpoint if nothing is
    /// open), and the number of open seconds. The final chunk may be short.
    pub fn interval_rates(&self, width: usize) -> Vec<IntervalRate> {
        let width = width.max(1);
        let mut out = Vec::new();
        let mut chunk_start = 0;
        while chunk_start < self.open.len() {
            let chunk_end = (chunk_start + width).min(self.open.len());
            let mut counted = 0u64;
            let mut open_seconds = 0usize;
            let mut time_sum = 0.0;
            for t in chunk_start..chunk_end {
                counted += self.counted[t];
                if self.open[t] {
                    open_seconds += 1;
                    time_sum += t as f64 + 0.5;
                }
            }
            let mean_time = if open_seconds > 0 {
                time_sum / open_seconds as f64
            } else {
                (chunk_start + chunk_end) as f64 / 2.0
            };
            out.push(IntervalRate {
                counted,
                mean_time,
                open_seconds,
            });
            chunk_start = chunk_end;
        }
        out
    }

    /// Per-second checked counts
    pub fn checked(&self) -> &[u64] {
        &self.checked
    }

    /// Per-second accepted counts
    pub fn accepted(&self) -> &[u64] {
        &self.accepted
    }

    /// Per-second science counts
    pub fn counted(&self) -> &[u64] {
        &self.counted
    }

    /// Snapshot for persistence: span, bit-packed mask, checked, accepted
    pub fn snapshot(&self) -> MaskSnapshot {
        MaskSnapshot {
            run_id: self.run_id,
            span: self.span,
            start_seconds: self.start_time.map(|t| t.as_seconds()),
            len: self.open.len(),
            mask_bits: pack_bits(&self.open),
            checked: self.checked.clone(),
            accepted: self.accepted.clone(),
        }
    }

    /// Rebuild a mask from a snapshot
    ///
    /// Science counts are not persisted and restore as zero. Counter vectors
    /// shorter than the recorded length load as neutral zero-padded data
    /// rather than failing.
    pub fn from_snapshot(snap: &MaskSnapshot) -> Self {
        let len = snap.len;
        let mut checked = snap.checked.clone();
        let mut accepted = snap.accepted.clone();
        checked.resize(len, 0);
        accepted.resize(len, 0);
        TimeMask {
            run_id: snap.run_id,
            span: snap.span,
            start_time: snap.start_seconds.map(ObsTime::from_seconds),
            open: unpack_bits(&snap.mask_bits, len),
            checked,
            accepted,
            counted: vec![0; len],
            out_of_domain: 0,
            overrides_applied: false,
        }
    }

    fn grow_to(&mut self, len: usize) {
        self.open.resize(len, true);
        self.checked.resize(len, 0);
        self.accepted.resize(len, 0);
        self.counted.resize(len, 0);
    }

    fn note_out_of_domain(&mut self) {
        self.out_of_domain += 1;
        if self.out_of_domain == OUT_OF_DOMAIN_WARN_THRESHOLD + 1 {
            tracing::warn!(
                run_id = self.run_id,
                threshold = OUT_OF_DOMAIN_WARN_THRESHOLD,
                "events outside the mask window exceed the reporting threshold"
            );
        }
    }
}

/// Pack open flags into bytes, LSB-first within each byte
fn pack_bits(flags: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; flags.len().div_ceil(8)];
    for (i, &flag) in flags.iter().enumerate() {
        if flag {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}

/// Unpack `len` flags from LSB-first packed bytes
fn unpack_bits(bytes: &[u8], len: usize) -> Vec<bool> {
    (0..len)
        .map(|i| {
            bytes
                .get(i / 8)
                .is_some_and(|byte| byte & (1 << (i % 8)) != 0)
        })
        .collect()
}
