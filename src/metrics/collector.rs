use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;

use super::percentiles::Percentiles;

// ─── Configuration ───────────────────────────────────────────────

/// HdrHistogram range: 1 μs → 60 s, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe tick timing recorder.
/// The worker calls `record_*()` once per tick, the controller reads
/// `snapshot()` whenever it likes.
pub struct TickMetrics {
    inner: Mutex<Inner>,
}

/// Read-only view of how well the loop kept its cadence.
#[derive(Debug, Clone, Serialize)]
pub struct TickSnapshot {
    /// Time spent inside the tick function (μs)
    pub tick_duration_us: Percentiles,
    /// How far past its scheduled instant the worker woke up (μs)
    pub wake_lateness_us: Percentiles,
    /// Wall time from the first tick's start to the last tick's end
    pub elapsed_secs: f64,
    pub ticks_per_sec: f64,
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    duration_hist: Histogram<u64>,
    lateness_hist: Histogram<u64>,
    first_start: Option<Instant>,
    last_end: Option<Instant>,
}

// ─── TickMetrics impl ────────────────────────────────────────────

impl TickMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Record one completed tick that ran from `started` to `ended`.
    pub fn record_tick(&self, started: Instant, ended: Instant) {
        let mut inner = self.inner.lock();
        inner.first_start.get_or_insert(started);
        inner.last_end = Some(ended);
        let _ = inner
            .duration_hist
            .record(clamp_us(ended.saturating_duration_since(started)));
    }

    /// Record how late the worker woke relative to its deadline.
    pub fn record_lateness(&self, lateness: Duration) {
        let _ = self.inner.lock().lateness_hist.record(clamp_us(lateness));
    }

    pub fn snapshot(&self) -> TickSnapshot {
        self.inner.lock().snapshot()
    }
}

impl Default for TickMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Histograms start at 1 μs.
fn clamp_us(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX).clamp(HIST_LOW, HIST_HIGH)
}

// ─── Inner impl ──────────────────────────────────────────────────

impl Inner {
    fn new() -> Self {
        Self {
            duration_hist: Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                .expect("histogram creation"),
            lateness_hist: Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                .expect("histogram creation"),
            first_start: None,
            last_end: None,
        }
    }

    fn snapshot(&self) -> TickSnapshot {
        let elapsed_secs = match (self.first_start, self.last_end) {
            (Some(first), Some(last)) => last.saturating_duration_since(first).as_secs_f64(),
            _ => 0.0,
        };

        let ticks_per_sec = if elapsed_secs > 0.0 {
            self.duration_hist.len() as f64 / elapsed_secs
        } else {
            0.0
        };

        TickSnapshot {
            tick_duration_us: Percentiles::from_histogram(&self.duration_hist),
            wake_lateness_us: Percentiles::from_histogram(&self.lateness_hist),
            elapsed_secs,
            ticks_per_sec,
        }
    }
}
