use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{append_fmt, MeasurementSource};

pub const DEFAULT_LOADAVG_PATH: &str = "/proc/loadavg";

/// 1-minute load average; the accumulator is the sum of every sampled value,
/// so dividing by the tick count gives the mean load over the run.
#[derive(Debug)]
pub struct LoadAvgSource {
    path: PathBuf,
    total: Mutex<f64>,
}

impl LoadAvgSource {
    /// Opens the source, reading once so an unusable file is rejected here
    /// rather than inside the sampling loop.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        read_load(&path)?;
        Ok(Self {
            path,
            total: Mutex::new(0.0),
        })
    }

    fn current(&self) -> f64 {
        read_load(&self.path)
            .unwrap_or_else(|e| panic!("loadavg: cannot read {}: {e}", self.path.display()))
    }
}

fn read_load(path: &Path) -> io::Result<f64> {
    let content = fs::read_to_string(path)?;
    content
        .split_whitespace()
        .next()
        .and_then(|field| field.parse::<f64>().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed loadavg line"))
}

impl MeasurementSource for LoadAvgSource {
    fn name(&self) -> &str {
        "loadavg"
    }

    fn accumulate(&self) {
        let load = self.current();
        *self.total.lock() += load;
    }

    fn accumulator(&self) -> f64 {
        *self.total.lock()
    }

    fn read_string(&self, out: &mut String) -> usize {
        append_fmt(out, format_args!("{:.2}", self.current()))
    }

    fn max_string_len(&self) -> usize {
        // "9999.99" leaves plenty of headroom for real load figures.
        12
    }
}
