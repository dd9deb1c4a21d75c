//! Counter enumeration and lookup by name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::counters::loadavg::DEFAULT_LOADAVG_PATH;
use crate::counters::rapl::DEFAULT_POWERCAP_ROOT;
use crate::counters::{CounterHandle, LoadAvgSource, RaplSource, SyntheticSource};

/// Resolves counter names to measurement sources.
pub trait Registry: Send + Sync {
    /// Every counter name this system supports, in a stable order.
    fn available_counters(&self) -> Vec<String>;

    /// Opens `name`, or `None` if the name does not resolve.
    fn open_counter(&self, name: &str) -> Option<CounterHandle>;
}

// ─── Static registry ─────────────────────────────────────────────

/// Registry over a fixed, caller-supplied set of sources, listed in
/// insertion order.
#[derive(Default, Clone)]
pub struct StaticRegistry {
    entries: Vec<CounterHandle>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, counter: CounterHandle) -> Self {
        self.insert(counter);
        self
    }

    /// Adds `counter`, replacing any source registered under the same name.
    pub fn insert(&mut self, counter: CounterHandle) {
        match self.entries.iter_mut().find(|c| c.name() == counter.name()) {
            Some(slot) => *slot = counter,
            None => self.entries.push(counter),
        }
    }
}

impl Registry for StaticRegistry {
    fn available_counters(&self) -> Vec<String> {
        self.entries.iter().map(|c| c.name().to_string()).collect()
    }

    fn open_counter(&self, name: &str) -> Option<CounterHandle> {
        self.entries.iter().find(|c| c.name() == name).cloned()
    }
}

// ─── Built-in registry ───────────────────────────────────────────

const ALIASES: &[(&str, &str)] = &[("load", "loadavg"), ("noise", "synthetic")];

/// Alias that resolves to the first RAPL zone on the host.
const POWER_ALIAS: &str = "power";

/// Host counters: RAPL powercap zones, the load average, and the
/// always-present `synthetic` gauge.
///
/// Opened sources are cached, so opening the same name twice yields the
/// same instance.
pub struct BuiltinRegistry {
    powercap_root: PathBuf,
    loadavg_path: PathBuf,
    opened: Mutex<HashMap<String, CounterHandle>>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::with_paths(DEFAULT_POWERCAP_ROOT, DEFAULT_LOADAVG_PATH)
    }

    /// Registry reading from non-default locations (containers, tests).
    pub fn with_paths(powercap_root: impl AsRef<Path>, loadavg_path: impl AsRef<Path>) -> Self {
        Self {
            powercap_root: powercap_root.as_ref().to_path_buf(),
            loadavg_path: loadavg_path.as_ref().to_path_buf(),
            opened: Mutex::new(HashMap::new()),
        }
    }

    /// Maps an alias to its canonical counter name; other names pass through.
    pub fn canonical_name(&self, name: &str) -> Option<String> {
        if name == POWER_ALIAS {
            return RaplSource::discover(&self.powercap_root)
                .into_iter()
                .map(|(name, _)| name)
                .next();
        }
        let canonical = ALIASES
            .iter()
            .find(|(alias, _)| *alias == name)
            .map_or(name, |&(_, target)| target);
        Some(canonical.to_string())
    }

    fn open_uncached(&self, name: &str) -> Option<CounterHandle> {
        let handle: CounterHandle = match name {
            "synthetic" => Arc::new(SyntheticSource::new()),
            "loadavg" => match LoadAvgSource::open(&self.loadavg_path) {
                Ok(src) => Arc::new(src),
                Err(e) => {
                    tracing::debug!(path = %self.loadavg_path.display(), error = %e, "loadavg unavailable");
                    return None;
                }
            },
            _ if name.starts_with("rapl:") => {
                let (_, dir) = RaplSource::discover(&self.powercap_root)
                    .into_iter()
                    .find(|(zone, _)| zone == name)?;
                match RaplSource::open(name, &dir) {
                    Ok(src) => Arc::new(src),
                    Err(e) => {
                        tracing::debug!(counter = name, error = %e, "RAPL zone unreadable");
                        return None;
                    }
                }
            }
            _ => return None,
        };
        Some(handle)
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry for BuiltinRegistry {
    fn available_counters(&self) -> Vec<String> {
        let mut names: Vec<String> = RaplSource::discover(&self.powercap_root)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        if LoadAvgSource::open(&self.loadavg_path).is_ok() {
            names.push("loadavg".to_string());
        }
        names.push("synthetic".to_string());
        names
    }

    fn open_counter(&self, name: &str) -> Option<CounterHandle> {
        let canonical = self.canonical_name(name)?;

        let mut opened = self.opened.lock();
        if let Some(handle) = opened.get(&canonical) {
            return Some(handle.clone());
        }

        let handle = self.open_uncached(&canonical)?;
        tracing::debug!(counter = %canonical, requested = name, "opened counter");
        opened.insert(canonical, handle.clone());
        Some(handle)
    }
}
