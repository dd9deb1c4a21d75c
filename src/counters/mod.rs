//! Measurement sources the sampling loop drives.
//!
//! A source keeps its own running total. The loop only ever calls it from
//! the worker thread while running and from the controller after the worker
//! has been joined, so implementations use plain interior mutability.

pub mod fixed;
pub mod loadavg;
pub mod rapl;
pub mod synthetic;

use std::sync::Arc;

pub use fixed::FixedSource;
pub use loadavg::LoadAvgSource;
pub use rapl::RaplSource;
pub use synthetic::SyntheticSource;

/// Capability set of a readable, accumulable counter.
///
/// Methods are infallible: a source that loses its backing device panics,
/// and the panic is re-raised on the controller thread by
/// [`Sampler::stop`](crate::Sampler::stop).
pub trait MeasurementSource: Send + Sync {
    /// Identifier the registry resolves this source by.
    fn name(&self) -> &str;

    /// Fold the current reading into the running total.
    fn accumulate(&self);

    /// Running total built up by [`accumulate`](Self::accumulate).
    fn accumulator(&self) -> f64;

    /// Append the current reading as text to `out`, returning the number of
    /// bytes appended.
    fn read_string(&self, out: &mut String) -> usize;

    /// Upper bound on the bytes a single [`read_string`](Self::read_string)
    /// call appends.
    fn max_string_len(&self) -> usize;

    /// Unit label of [`accumulator`](Self::accumulator).
    fn unit(&self) -> &str {
        ""
    }
}

/// Shared handle; a registry may keep the canonical instance and hand out
/// clones.
pub type CounterHandle = Arc<dyn MeasurementSource>;

/// Append `args` to `out` and return how many bytes were written.
pub(crate) fn append_fmt(out: &mut String, args: std::fmt::Arguments<'_>) -> usize {
    use std::fmt::Write;

    let before = out.len();
    // Writing into a String cannot fail.
    let _ = out.write_fmt(args);
    out.len() - before
}
