use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::metrics::TickSnapshot;
use crate::sampler::{Mode, Sampler};

/// Final value of one counter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterReading {
    pub name: String,
    pub value: f64,
    pub unit: String,
}

/// Everything a finished run produced, ready for printing or JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    pub interval_ms: u64,
    pub mode: Mode,
    pub ticks: u64,
    pub counters: Vec<CounterReading>,
    pub timing: TickSnapshot,
}

impl RunReport {
    /// Pairs `values` (as returned by [`Sampler::stop`]) with the sampler's
    /// counters, in order.
    pub fn new(
        sampler: &Sampler,
        values: &[f64],
        started_at: DateTime<Utc>,
        stopped_at: DateTime<Utc>,
    ) -> Self {
        debug_assert_eq!(
            values.len(),
            sampler.counters().len(),
            "report expects one value per counter, as returned by stop"
        );
        let counters = sampler
            .counters()
            .iter()
            .zip(values)
            .map(|(counter, &value)| CounterReading {
                name: counter.name().to_string(),
                value,
                unit: counter.unit().to_string(),
            })
            .collect();

        Self {
            run_id: sampler.run_id(),
            started_at,
            stopped_at,
            interval_ms: sampler.interval().as_millis() as u64,
            mode: sampler.mode(),
            ticks: sampler.ticks(),
            counters,
            timing: sampler.tick_stats(),
        }
    }

    /// Human-readable summary table.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let width = self
            .counters
            .iter()
            .map(|c| c.name.len())
            .max()
            .unwrap_or(0)
            .max("counter".len());

        let _ = writeln!(out, "run {}", self.run_id);
        let _ = writeln!(
            out,
            "  {} ticks @ {} ms over {:.3} s ({:.1} ticks/s)",
            self.ticks, self.interval_ms, self.timing.elapsed_secs, self.timing.ticks_per_sec
        );
        if self.timing.tick_duration_us.has_data() {
            let d = &self.timing.tick_duration_us;
            let l = &self.timing.wake_lateness_us;
            let _ = writeln!(
                out,
                "  tick μs p50/p99/max {}/{}/{}   late μs p50/p99/max {}/{}/{}",
                d.p50, d.p99, d.max, l.p50, l.p99, l.max
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "  {:<width$}  {:>18}", "counter", "accumulated");
        for c in &self.counters {
            let _ = writeln!(out, "  {:<width$}  {:>18.6} {}", c.name, c.value, c.unit);
        }
        out
    }
}
