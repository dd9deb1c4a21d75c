//! Periodic sampling harness for hardware and software counters.
//!
//! A [`Sampler`] drives one background thread that, at a fixed interval,
//! either accumulates every configured counter or prints one line of their
//! current readings. Counters are looked up by name through a [`Registry`].
//!
//! ```no_run
//! use std::time::Duration;
//! use power_sampler::{BuiltinRegistry, Mode, Sampler};
//!
//! let registry = BuiltinRegistry::new();
//! let mut sampler = Sampler::new(
//!     &registry,
//!     Duration::from_millis(100),
//!     &["synthetic".to_string()],
//!     Mode::Accumulate,
//! )?;
//! sampler.start(Duration::ZERO);
//! let totals = sampler.stop(Duration::from_secs(1));
//! println!("{} ticks, totals {totals:?}", sampler.ticks());
//! # Ok::<(), power_sampler::Error>(())
//! ```

pub mod config;
pub mod counters;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod report;
pub mod sampler;

pub use config::SamplerConfig;
pub use counters::{CounterHandle, MeasurementSource};
pub use error::{Error, Result};
pub use registry::{BuiltinRegistry, Registry, StaticRegistry};
pub use report::{CounterReading, RunReport};
pub use sampler::{Mode, Phase, Sampler, SamplerOptions, Schedule};
