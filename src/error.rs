use std::io;

/// Errors surfaced while building or configuring a [`Sampler`](crate::Sampler).
///
/// Everything here is reported synchronously at construction time; once a
/// sampler exists, its loop has no recoverable failure path.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No counters could be resolved (none requested and none available).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A requested counter name did not resolve in the registry.
    #[error("unknown counter \"{name}\"")]
    UnknownCounter { name: String },

    /// The combined worst-case width of all formatted readings does not fit
    /// in the continuous-print line buffer.
    #[error("sample line needs up to {required} bytes but the limit is {limit}")]
    LineTooWide { required: usize, limit: usize },

    /// The worker thread could not be created.
    #[error("failed to spawn sampling thread: {0}")]
    Spawn(#[source] io::Error),

    /// The configuration file could not be read.
    #[error("cannot read config file: {0}")]
    ConfigFile(#[source] io::Error),

    /// The configuration file is not valid TOML for [`SamplerConfig`](crate::SamplerConfig).
    #[error("invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
