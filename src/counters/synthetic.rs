use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use super::{append_fmt, MeasurementSource};

const DEFAULT_SEED: u64 = 1000;
const FLOOR: f64 = 0.0;
const CEILING: f64 = 100.0;

/// Random-walk gauge bounded to `[0, 100]`.
///
/// Seeded, so two sources built with the same seed produce the same series.
/// Always available, which keeps the sampler usable on hosts without any
/// hardware counters.
pub struct SyntheticSource {
    state: Mutex<Walk>,
}

struct Walk {
    rng: StdRng,
    level: f64,
    total: f64,
}

impl Walk {
    fn step(&mut self) -> f64 {
        self.level = (self.level + self.rng.gen_range(-1.0_f64..1.0)).clamp(FLOOR, CEILING);
        self.level
    }
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            state: Mutex::new(Walk {
                rng: StdRng::seed_from_u64(seed),
                level: CEILING / 2.0,
                total: 0.0,
            }),
        }
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn accumulate(&self) {
        let mut walk = self.state.lock();
        let level = walk.step();
        walk.total += level;
    }

    fn accumulator(&self) -> f64 {
        self.state.lock().total
    }

    fn read_string(&self, out: &mut String) -> usize {
        let level = self.state.lock().step();
        append_fmt(out, format_args!("{level:.3}"))
    }

    fn max_string_len(&self) -> usize {
        "100.000".len()
    }
}
