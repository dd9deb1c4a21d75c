//! Background sampling loop and its start/stop lifecycle.
//!
//! A [`Sampler`] owns exactly one worker thread. The thread is spawned at
//! construction and parks on a start gate; [`Sampler::start`] opens the gate,
//! [`Sampler::stop`] halts the loop, joins the thread and reads every
//! counter's accumulator. Ticks never overlap and the stop request is seen
//! at the latest when the current tick returns.

mod control;
mod schedule;
mod tick;

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::counters::CounterHandle;
use crate::error::{Error, Result};
use crate::metrics::{TickMetrics, TickSnapshot};
use crate::registry::Registry;

use control::{Control, FinishGuard};
use schedule::Pacer;
use tick::{LinePrinter, Tick};

pub use control::Phase;
pub use schedule::Schedule;
pub use tick::{Mode, DEFAULT_MAX_LINE_BYTES, SEPARATOR};

// ─── Options ─────────────────────────────────────────────────────

/// Construction knobs beyond interval, counters and mode.
pub struct SamplerOptions {
    pub mode: Mode,
    pub schedule: Schedule,
    /// Bound on one continuous-print line; checked against the counters'
    /// declared widths at construction.
    pub max_line_bytes: usize,
    /// Destination of continuous-print lines. `None` means stdout.
    pub sink: Option<Box<dyn Write + Send>>,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            schedule: Schedule::default(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            sink: None,
        }
    }
}

impl SamplerOptions {
    pub fn mode(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_max_line_bytes(mut self, limit: usize) -> Self {
        self.max_line_bytes = limit;
        self
    }

    pub fn with_sink(mut self, sink: impl Write + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }
}

// ─── Sampler ─────────────────────────────────────────────────────

/// State the controller and the worker both touch.
struct Shared {
    control: Control,
    ticks: AtomicU64,
    metrics: TickMetrics,
}

/// Periodic sampler over a fixed, ordered set of counters.
///
/// Must be stopped exactly once. Calling [`stop`](Self::stop) a second time
/// panics. Dropping a sampler that was never stopped halts and joins the
/// worker, discarding the accumulated values.
pub struct Sampler {
    run_id: Uuid,
    interval: Duration,
    mode: Mode,
    counters: Arc<[CounterHandle]>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Sampler {
    /// Opens `counters` (or, if empty, every counter the registry offers)
    /// and spawns the parked worker thread.
    pub fn new(
        registry: &dyn Registry,
        interval: Duration,
        counters: &[String],
        mode: Mode,
    ) -> Result<Self> {
        Self::with_options(registry, interval, counters, SamplerOptions::mode(mode))
    }

    pub fn with_options(
        registry: &dyn Registry,
        interval: Duration,
        counters: &[String],
        options: SamplerOptions,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::Configuration(
                "sampling interval must be greater than zero".into(),
            ));
        }
        if Instant::now().checked_add(interval).is_none() {
            return Err(Error::Configuration(format!(
                "sampling interval {interval:?} is too large"
            )));
        }

        let names = if counters.is_empty() {
            registry.available_counters()
        } else {
            counters.to_vec()
        };
        if names.is_empty() {
            return Err(Error::Configuration(
                "no counters available on this system".into(),
            ));
        }

        let handles = names
            .iter()
            .map(|name| {
                registry
                    .open_counter(name)
                    .ok_or_else(|| Error::UnknownCounter { name: name.clone() })
            })
            .collect::<Result<Vec<_>>>()?;

        let tick = match options.mode {
            Mode::Accumulate => Tick::Accumulate,
            Mode::ContinuousPrint => {
                let sink = options
                    .sink
                    .unwrap_or_else(|| Box::new(io::stdout()) as Box<dyn Write + Send>);
                Tick::Print(LinePrinter::new(&handles, options.max_line_bytes, sink)?)
            }
        };

        let run_id = Uuid::new_v4();
        let counters: Arc<[CounterHandle]> = handles.into();
        let shared = Arc::new(Shared {
            control: Control::new(),
            ticks: AtomicU64::new(0),
            metrics: TickMetrics::new(),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            let counters = Arc::clone(&counters);
            let schedule = options.schedule;
            thread::Builder::new()
                .name(format!("sampler-{}", &run_id.simple().to_string()[..8]))
                .spawn(move || run_loop(&shared, &counters, tick, schedule, interval))
                .map_err(Error::Spawn)?
        };

        tracing::info!(
            run_id = %run_id,
            interval_ms = interval.as_millis() as u64,
            mode = ?options.mode,
            schedule = ?options.schedule,
            counters = ?names,
            "sampler ready"
        );

        Ok(Self {
            run_id,
            interval,
            mode: options.mode,
            counters,
            shared,
            worker: Some(worker),
        })
    }

    /// Sleeps for `delay`, then releases the worker. Further calls have no
    /// additional effect.
    pub fn start(&self, delay: Duration) {
        thread::sleep(delay);
        self.shared.control.release();
        tracing::info!(run_id = %self.run_id, "sampling started");
    }

    /// Sleeps for `delay`, halts the loop, waits for the worker to exit and
    /// returns every counter's accumulator in configuration order.
    ///
    /// Works whether or not [`start`](Self::start) was called. Blocks for as
    /// long as an in-flight tick takes.
    ///
    /// # Panics
    ///
    /// If called twice, or re-raises the panic of a counter that failed
    /// inside a tick.
    pub fn stop(&mut self, delay: Duration) -> Vec<f64> {
        let Some(worker) = self.worker.take() else {
            panic!("sampler {} stopped twice", self.run_id);
        };

        thread::sleep(delay);
        self.shared.control.halt();
        if let Err(panic) = worker.join() {
            std::panic::resume_unwind(panic);
        }

        let values: Vec<f64> = self.counters.iter().map(|c| c.accumulator()).collect();
        tracing::info!(run_id = %self.run_id, ticks = self.ticks(), "sampling stopped");
        values
    }

    /// Completed ticks so far; a relaxed, best-effort read.
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Relaxed)
    }

    pub fn phase(&self) -> Phase {
        self.shared.control.phase()
    }

    pub fn is_stopped(&self) -> bool {
        self.worker.is_none()
    }

    pub fn tick_stats(&self) -> TickSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Opened counters, in configuration order.
    pub fn counters(&self) -> &[CounterHandle] {
        &self.counters
    }

    pub fn counter_names(&self) -> Vec<&str> {
        self.counters.iter().map(|c| c.name()).collect()
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        tracing::warn!(run_id = %self.run_id, "sampler dropped without stop, joining worker");
        self.shared.control.halt();
        if worker.join().is_err() {
            tracing::error!(run_id = %self.run_id, "sampling worker panicked");
        }
    }
}

// ─── Worker loop ─────────────────────────────────────────────────

fn run_loop(
    shared: &Shared,
    counters: &[CounterHandle],
    mut tick: Tick,
    schedule: Schedule,
    interval: Duration,
) {
    let _finish = FinishGuard(&shared.control);
    if !shared.control.wait_for_start() {
        return;
    }

    let pacer = Pacer::new(schedule, interval, Instant::now());
    while !shared.control.halted() {
        let entry = Instant::now();
        tick.run(counters);
        shared.ticks.fetch_add(1, Ordering::Relaxed);

        let done = Instant::now();
        shared.metrics.record_tick(entry, done);

        let Some(deadline) = pacer.next_deadline(entry, done) else {
            shared.control.wait_for_halt();
            break;
        };
        if done > deadline {
            tracing::debug!(
                overrun_us = (done - deadline).as_micros() as u64,
                "tick overran its interval"
            );
        }
        if shared.control.sleep_until(deadline) {
            break;
        }
        shared
            .metrics
            .record_lateness(Instant::now().saturating_duration_since(deadline));
    }
}
