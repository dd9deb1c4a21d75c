use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::sampler::{Mode, Sampler, SamplerOptions, Schedule, DEFAULT_MAX_LINE_BYTES};

/// Run configuration, usually read from a TOML file.
///
/// ```toml
/// interval_ms = 50
/// counters = ["rapl:package-0", "loadavg"]
/// mode = "continuous_print"
/// schedule = "epoch"
/// duration_ms = 10000
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplerConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Counter names or aliases; empty samples everything available.
    #[serde(default)]
    pub counters: Vec<String>,

    #[serde(default)]
    pub mode: Mode,

    #[serde(default)]
    pub schedule: Schedule,

    /// Pause before the worker is released
    #[serde(default)]
    pub start_delay_ms: u64,

    /// How long to sample; unset runs until interrupted
    #[serde(default)]
    pub duration_ms: Option<u64>,

    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

fn default_interval_ms() -> u64 {
    100
}
fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            counters: Vec::new(),
            mode: Mode::default(),
            schedule: Schedule::default(),
            start_delay_ms: 0,
            duration_ms: None,
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

impl SamplerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::ConfigFile)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms.map(Duration::from_millis)
    }

    /// Options for [`Sampler::with_options`]; continuous-print output goes
    /// to stdout.
    pub fn options(&self) -> SamplerOptions {
        SamplerOptions::mode(self.mode)
            .with_schedule(self.schedule)
            .with_max_line_bytes(self.max_line_bytes)
    }

    /// Opens the configured counters and spawns the parked sampler.
    pub fn build(&self, registry: &dyn Registry) -> Result<Sampler> {
        Sampler::with_options(registry, self.interval(), &self.counters, self.options())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = SamplerConfig::from_toml("").unwrap();
        assert_eq!(config, SamplerConfig::default());
        assert_eq!(config.interval(), Duration::from_millis(100));
        assert_eq!(config.duration(), None);
    }

    #[test]
    fn parses_every_field() {
        let config = SamplerConfig::from_toml(
            r#"
            interval_ms = 50
            counters = ["rapl:package-0", "loadavg"]
            mode = "continuous_print"
            schedule = "epoch"
            start_delay_ms = 200
            duration_ms = 10000
            max_line_bytes = 512
            "#,
        )
        .unwrap();
        assert_eq!(config.interval(), Duration::from_millis(50));
        assert_eq!(config.counters, vec!["rapl:package-0", "loadavg"]);
        assert_eq!(config.mode, Mode::ContinuousPrint);
        assert_eq!(config.schedule, Schedule::Epoch);
        assert_eq!(config.start_delay(), Duration::from_millis(200));
        assert_eq!(config.duration(), Some(Duration::from_secs(10)));
        assert_eq!(config.max_line_bytes, 512);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = SamplerConfig::from_toml("intervl_ms = 5").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn missing_file_is_a_file_error() {
        let err = SamplerConfig::load("/nonexistent/sampler.toml").unwrap_err();
        assert!(matches!(err, Error::ConfigFile(_)));
    }
}
