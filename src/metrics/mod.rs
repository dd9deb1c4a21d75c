//! Timing statistics of the sampling loop itself.

pub mod collector;
pub mod percentiles;

pub use collector::{TickMetrics, TickSnapshot};
pub use percentiles::Percentiles;
