use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use power_sampler::counters::FixedSource;
use power_sampler::{
    Error, MeasurementSource, Mode, Phase, Sampler, SamplerOptions, Schedule, StaticRegistry,
};

/// In-memory stdout stand-in shared between the test and the worker.
#[derive(Clone, Default)]
struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn fixed(names: &[&str], step: f64) -> (StaticRegistry, Vec<Arc<FixedSource>>) {
    let sources: Vec<Arc<FixedSource>> = names
        .iter()
        .map(|name| Arc::new(FixedSource::new(*name, step, format!("{name}-val"))))
        .collect();
    let registry = sources
        .iter()
        .fold(StaticRegistry::new(), |reg, src| reg.with(src.clone()));
    (registry, sources)
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn no_ticks_before_start() {
    let (registry, _) = fixed(&["a", "b"], 1.0);
    let mut sampler =
        Sampler::new(&registry, Duration::from_millis(1), &[], Mode::Accumulate).unwrap();
    assert_eq!(sampler.ticks(), 0);

    thread::sleep(Duration::from_millis(20));
    assert_eq!(sampler.ticks(), 0);
    sampler.stop(Duration::ZERO);
}

#[test]
fn empty_registry_is_a_configuration_error() {
    let registry = StaticRegistry::new();
    let err = Sampler::new(&registry, Duration::from_millis(10), &[], Mode::Accumulate)
        .err()
        .unwrap();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn unknown_name_is_reported() {
    let (registry, _) = fixed(&["a", "b"], 1.0);
    let err = Sampler::new(
        &registry,
        Duration::from_millis(10),
        &names(&["a", "missing", "b"]),
        Mode::Accumulate,
    )
    .err()
    .unwrap();
    match err {
        Error::UnknownCounter { name } => assert_eq!(name, "missing"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn results_follow_configured_order() {
    let (registry, _) = fixed(&["a", "b", "c"], 1.0);
    let registry = registry
        .with(Arc::new(FixedSource::new("ten", 10.0, "")))
        .with(Arc::new(FixedSource::new("hundred", 100.0, "")));
    let mut sampler = Sampler::new(
        &registry,
        Duration::from_millis(2),
        &names(&["hundred", "a", "ten"]),
        Mode::Accumulate,
    )
    .unwrap();
    assert_eq!(sampler.counter_names(), vec!["hundred", "a", "ten"]);

    sampler.start(Duration::ZERO);
    let values = sampler.stop(Duration::ZERO);
    let ticks = sampler.ticks() as f64;

    assert_eq!(values.len(), 3);
    assert_eq!(values, vec![100.0 * ticks, ticks, 10.0 * ticks]);
}

#[test]
fn stop_without_start_terminates() {
    let (registry, sources) = fixed(&["a", "b"], 1.0);
    let mut sampler =
        Sampler::new(&registry, Duration::from_secs(60), &[], Mode::Accumulate).unwrap();

    let began = Instant::now();
    let values = sampler.stop(Duration::ZERO);
    assert!(began.elapsed() < Duration::from_secs(5));

    assert_eq!(values, vec![0.0, 0.0]);
    assert_eq!(sampler.ticks(), 0);
    assert_eq!(sampler.phase(), Phase::Stopped);
    assert!(sources.iter().all(|s| s.accumulations() == 0));
}

#[test]
fn stop_wakes_a_sleeping_worker() {
    let (registry, _) = fixed(&["a"], 1.0);
    let mut sampler =
        Sampler::new(&registry, Duration::from_secs(60), &[], Mode::Accumulate).unwrap();
    sampler.start(Duration::ZERO);

    let began = Instant::now();
    let values = sampler.stop(Duration::from_millis(50));
    assert!(began.elapsed() < Duration::from_secs(5));
    // the first tick runs immediately on release
    assert_eq!(sampler.ticks(), 1);
    assert_eq!(values, vec![1.0]);
}

#[test]
fn tick_rate_follows_interval() {
    let (registry, _) = fixed(&["a"], 1.0);
    let mut sampler =
        Sampler::new(&registry, Duration::from_millis(10), &[], Mode::Accumulate).unwrap();

    sampler.start(Duration::ZERO);
    sampler.stop(Duration::from_millis(105));

    let ticks = sampler.ticks();
    assert!((8..=12).contains(&ticks), "observed {ticks} ticks");
}

#[test]
fn epoch_schedule_keeps_the_same_cadence() {
    let (registry, _) = fixed(&["a"], 1.0);
    let mut sampler = Sampler::with_options(
        &registry,
        Duration::from_millis(10),
        &[],
        SamplerOptions::mode(Mode::Accumulate).with_schedule(Schedule::Epoch),
    )
    .unwrap();

    sampler.start(Duration::ZERO);
    sampler.stop(Duration::from_millis(105));

    let ticks = sampler.ticks();
    assert!((8..=12).contains(&ticks), "observed {ticks} ticks");
}

#[test]
fn continuous_print_writes_one_line_per_tick() {
    let (registry, sources) = fixed(&["a", "b", "c"], 1.0);
    let output = CapturedOutput::default();
    let mut sampler = Sampler::with_options(
        &registry,
        Duration::from_millis(5),
        &[],
        SamplerOptions::mode(Mode::ContinuousPrint).with_sink(output.clone()),
    )
    .unwrap();

    sampler.start(Duration::ZERO);
    let values = sampler.stop(Duration::from_millis(40));

    let lines = output.lines();
    assert_eq!(lines.len() as u64, sampler.ticks());
    assert!(!lines.is_empty());
    for line in &lines {
        assert_eq!(line, "a-val,b-val,c-val");
        assert_eq!(line.split(',').count(), 3);
        assert!(!line.ends_with(','));
    }

    // printing does not accumulate
    assert_eq!(values, vec![0.0, 0.0, 0.0]);
    assert!(sources.iter().all(|s| s.accumulations() == 0));
}

#[test]
fn continuous_print_rejects_oversized_lines() {
    let (registry, _) = fixed(&["a", "b", "c"], 1.0);
    let err = Sampler::with_options(
        &registry,
        Duration::from_millis(5),
        &[],
        SamplerOptions::mode(Mode::ContinuousPrint)
            .with_max_line_bytes(8)
            .with_sink(io::sink()),
    )
    .err()
    .unwrap();
    // "a-val,b-val,c-val\n"
    assert!(matches!(err, Error::LineTooWide { required: 18, limit: 8 }));
}

#[test]
fn accumulated_totals_equal_step_times_ticks() {
    let half = Arc::new(FixedSource::new("half", 0.5, ""));
    let quarter = Arc::new(FixedSource::new("quarter", 0.25, ""));
    let registry = StaticRegistry::new()
        .with(half.clone())
        .with(quarter.clone());

    let mut sampler =
        Sampler::new(&registry, Duration::from_millis(3), &[], Mode::Accumulate).unwrap();
    sampler.start(Duration::ZERO);
    let values = sampler.stop(Duration::from_millis(30));

    let ticks = sampler.ticks();
    assert!(ticks > 0);
    assert_eq!(half.accumulations(), ticks);
    assert_eq!(values, vec![0.5 * ticks as f64, 0.25 * ticks as f64]);
    assert_eq!(half.accumulator(), values[0]);
}

#[test]
fn tick_stats_cover_every_tick() {
    let (registry, _) = fixed(&["a"], 1.0);
    let mut sampler =
        Sampler::new(&registry, Duration::from_millis(5), &[], Mode::Accumulate).unwrap();
    sampler.start(Duration::ZERO);
    sampler.stop(Duration::from_millis(30));

    let stats = sampler.tick_stats();
    assert_eq!(stats.tick_duration_us.count, sampler.ticks());
    assert!(stats.wake_lateness_us.count <= sampler.ticks());
}

#[test]
fn dropping_an_unstarted_sampler_joins_the_worker() {
    let (registry, sources) = fixed(&["a"], 1.0);
    let sampler =
        Sampler::new(&registry, Duration::from_secs(60), &[], Mode::Accumulate).unwrap();

    let began = Instant::now();
    drop(sampler);
    assert!(began.elapsed() < Duration::from_secs(5));
    assert_eq!(sources[0].accumulations(), 0);
}

#[test]
fn second_start_does_not_restart_the_loop() {
    let (registry, _) = fixed(&["a"], 1.0);
    let mut sampler =
        Sampler::new(&registry, Duration::from_secs(60), &[], Mode::Accumulate).unwrap();

    sampler.start(Duration::ZERO);
    thread::sleep(Duration::from_millis(20));
    sampler.start(Duration::ZERO);
    let values = sampler.stop(Duration::from_millis(20));

    // one immediate tick, then the worker sleeps out the long interval
    assert_eq!(sampler.ticks(), 1);
    assert_eq!(values, vec![1.0]);
    assert_eq!(sampler.phase(), Phase::Stopped);
}

#[test]
fn start_after_stop_is_inert() {
    let (registry, sources) = fixed(&["a"], 1.0);
    let mut sampler =
        Sampler::new(&registry, Duration::from_millis(1), &[], Mode::Accumulate).unwrap();

    sampler.stop(Duration::ZERO);
    sampler.start(Duration::ZERO);
    thread::sleep(Duration::from_millis(10));
    assert_eq!(sampler.ticks(), 0);
    assert_eq!(sources[0].accumulations(), 0);
}
