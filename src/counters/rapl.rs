use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{append_fmt, MeasurementSource};

pub const DEFAULT_POWERCAP_ROOT: &str = "/sys/class/powercap";

const ZONE_PREFIX: &str = "intel-rapl:";
const MICROJOULES_PER_JOULE: f64 = 1_000_000.0;

/// Energy counter of one RAPL powercap zone.
///
/// The hardware register is a wrapping microjoule counter; the accumulator
/// is the wrap-corrected energy in joules consumed since the source was
/// opened. `read_string` prints the joules consumed since its previous call.
#[derive(Debug)]
pub struct RaplSource {
    name: String,
    energy_path: PathBuf,
    max_range_uj: Option<u64>,
    state: Mutex<Readings>,
}

#[derive(Debug)]
struct Readings {
    last_accumulate_uj: u64,
    last_print_uj: u64,
    total_uj: u128,
}

impl RaplSource {
    /// Opens the zone at `zone_dir` under the counter name `name`.
    pub fn open(name: impl Into<String>, zone_dir: &Path) -> io::Result<Self> {
        let energy_path = zone_dir.join("energy_uj");
        let now = read_u64(&energy_path)?;
        let max_range_uj = read_u64(&zone_dir.join("max_energy_range_uj")).ok();
        Ok(Self {
            name: name.into(),
            energy_path,
            max_range_uj,
            state: Mutex::new(Readings {
                last_accumulate_uj: now,
                last_print_uj: now,
                total_uj: 0,
            }),
        })
    }

    /// Lists every readable zone under `root` as `(counter name, zone dir)`,
    /// ordered by zone directory.
    ///
    /// Top-level zones are named `rapl:<zone>`; subzones are named
    /// `rapl:<parent>/<zone>` so that e.g. the `core` subzones of two
    /// packages stay distinct.
    pub fn discover(root: &Path) -> Vec<(String, PathBuf)> {
        let Ok(entries) = fs::read_dir(root) else {
            return Vec::new();
        };

        let mut dirs: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let file_name = entry.file_name().into_string().ok()?;
                let id = file_name.strip_prefix(ZONE_PREFIX)?.to_string();
                Some((id, entry.path()))
            })
            .filter(|(_, dir)| dir.join("energy_uj").is_file())
            .collect();
        dirs.sort_by_key(|(id, _)| zone_order(id));

        dirs.iter()
            .filter_map(|(id, dir)| {
                let zone = zone_label(dir)?;
                let name = match id.rsplit_once(':') {
                    Some((parent_id, _)) => {
                        let parent = dirs
                            .iter()
                            .find(|(other, _)| other == parent_id)
                            .and_then(|(_, parent_dir)| zone_label(parent_dir))
                            .unwrap_or_else(|| parent_id.to_string());
                        format!("rapl:{parent}/{zone}")
                    }
                    None => format!("rapl:{zone}"),
                };
                Some((name, dir.clone()))
            })
            .collect()
    }

    fn current_uj(&self) -> u64 {
        read_u64(&self.energy_path).unwrap_or_else(|e| {
            panic!("{}: cannot read {}: {e}", self.name, self.energy_path.display())
        })
    }

    /// Energy between two raw readings, accounting for one counter wrap.
    fn delta(&self, before: u64, after: u64) -> u64 {
        if after >= before {
            return after - before;
        }
        match self.max_range_uj {
            Some(range) => range.saturating_sub(before) + after,
            None => 0,
        }
    }
}

/// Sort key for a zone id such as `1:0`: numeric per `:` segment, so
/// `intel-rapl:2` comes before `intel-rapl:10`.
fn zone_order(id: &str) -> Vec<u64> {
    id.split(':')
        .map(|part| part.parse().unwrap_or(u64::MAX))
        .collect()
}

fn zone_label(dir: &Path) -> Option<String> {
    fs::read_to_string(dir.join("name"))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn read_u64(path: &Path) -> io::Result<u64> {
    fs::read_to_string(path)?
        .trim()
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

impl MeasurementSource for RaplSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn accumulate(&self) {
        let now = self.current_uj();
        let mut readings = self.state.lock();
        let delta = self.delta(readings.last_accumulate_uj, now);
        readings.total_uj += u128::from(delta);
        readings.last_accumulate_uj = now;
    }

    fn accumulator(&self) -> f64 {
        self.state.lock().total_uj as f64 / MICROJOULES_PER_JOULE
    }

    fn read_string(&self, out: &mut String) -> usize {
        let now = self.current_uj();
        let mut readings = self.state.lock();
        let delta = self.delta(readings.last_print_uj, now);
        readings.last_print_uj = now;
        append_fmt(out, format_args!("{:.6}", delta as f64 / MICROJOULES_PER_JOULE))
    }

    fn max_string_len(&self) -> usize {
        // u64::MAX microjoules in joules with six decimals.
        "18446744073709.551615".len()
    }

    fn unit(&self) -> &str {
        "J"
    }
}
