use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// How the worker picks the instant of its next tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    /// Next tick at this tick's start + interval. A slow tick pushes every
    /// later tick back by however long `now()` was read after the deadline
    /// (the skid); drift never accumulates from tick execution time alone.
    #[default]
    Skid,
    /// Next tick at the first `epoch + k * interval` still in the future.
    /// Missed slots are skipped rather than replayed in a burst.
    Epoch,
}

/// Computes tick deadlines for one run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pacer {
    schedule: Schedule,
    interval: Duration,
    epoch: Instant,
}

impl Pacer {
    pub(crate) fn new(schedule: Schedule, interval: Duration, epoch: Instant) -> Self {
        Self {
            schedule,
            interval,
            epoch,
        }
    }

    /// Deadline for the tick after the one that began at `tick_start`,
    /// evaluated at `now`. `None` if the deadline lies beyond what `Instant`
    /// can represent.
    pub(crate) fn next_deadline(&self, tick_start: Instant, now: Instant) -> Option<Instant> {
        match self.schedule {
            Schedule::Skid => tick_start.checked_add(self.interval),
            Schedule::Epoch => {
                let step = self.interval.as_nanos().max(1);
                let elapsed = now.saturating_duration_since(self.epoch).as_nanos();
                let slot = (elapsed / step + 1).checked_mul(step)?;
                let offset = Duration::from_nanos(u64::try_from(slot).ok()?);
                self.epoch.checked_add(offset)
            }
        }
    }
}
