use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::MeasurementSource;

/// Deterministic source: each accumulate adds `step`, each read prints the
/// same text. Handy as a test double and for dry runs.
#[derive(Debug)]
pub struct FixedSource {
    name: String,
    step: f64,
    text: String,
    total: Mutex<f64>,
    accumulations: AtomicU64,
    reads: AtomicU64,
}

impl FixedSource {
    pub fn new(name: impl Into<String>, step: f64, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            step,
            text: text.into(),
            total: Mutex::new(0.0),
            accumulations: AtomicU64::new(0),
            reads: AtomicU64::new(0),
        }
    }

    /// How many times `accumulate` has run.
    pub fn accumulations(&self) -> u64 {
        self.accumulations.load(Ordering::Relaxed)
    }

    /// How many times `read_string` has run.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl MeasurementSource for FixedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn accumulate(&self) {
        *self.total.lock() += self.step;
        self.accumulations.fetch_add(1, Ordering::Relaxed);
    }

    fn accumulator(&self) -> f64 {
        *self.total.lock()
    }

    fn read_string(&self, out: &mut String) -> usize {
        self.reads.fetch_add(1, Ordering::Relaxed);
        out.push_str(&self.text);
        self.text.len()
    }

    fn max_string_len(&self) -> usize {
        self.text.len()
    }
}
