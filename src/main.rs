use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use power_sampler::{BuiltinRegistry, Mode, Registry, RunReport, SamplerConfig, Schedule};

/// Sample power and performance counters at a fixed interval.
#[derive(Debug, Parser)]
#[command(name = "power-sampler", version)]
struct Cli {
    /// TOML run configuration; the flags below override its values
    #[arg(short, long, env = "POWER_SAMPLER_CONFIG")]
    config: Option<PathBuf>,

    /// Sampling interval in milliseconds
    #[arg(short, long)]
    interval_ms: Option<u64>,

    /// Counter to sample (repeatable); default is every available counter
    #[arg(short = 'C', long = "counter")]
    counters: Vec<String>,

    /// Print one line of readings per tick instead of accumulating
    #[arg(short, long)]
    print: bool,

    /// Align ticks to a fixed grid from the start instant
    #[arg(long)]
    epoch: bool,

    /// Stop after this many milliseconds (default: run until Ctrl-C)
    #[arg(short, long)]
    duration_ms: Option<u64>,

    /// Wait this long before the first tick
    #[arg(long)]
    start_delay_ms: Option<u64>,

    /// List the counters available on this host and exit
    #[arg(short, long)]
    list: bool,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(&self, mut config: SamplerConfig) -> SamplerConfig {
        if let Some(ms) = self.interval_ms {
            config.interval_ms = ms;
        }
        if !self.counters.is_empty() {
            config.counters = self.counters.clone();
        }
        if self.print {
            config.mode = Mode::ContinuousPrint;
        }
        if self.epoch {
            config.schedule = Schedule::Epoch;
        }
        if self.duration_ms.is_some() {
            config.duration_ms = self.duration_ms;
        }
        if let Some(ms) = self.start_delay_ms {
            config.start_delay_ms = ms;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries sample lines and the report.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("power_sampler=info")),
        )
        .init();

    let cli = Cli::parse();
    let registry = BuiltinRegistry::new();

    if cli.list {
        for name in registry.available_counters() {
            println!("{name}");
        }
        return Ok(());
    }

    // ── 1. Resolve configuration ─────────────────────────────────
    let file_config = match &cli.config {
        Some(path) => SamplerConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SamplerConfig::default(),
    };
    let config = cli.apply(file_config);

    eprintln!();
    eprintln!("╔══════════════════════════════════════════════════╗");
    eprintln!("║   ⚡  POWER SAMPLER                              ║");
    eprintln!("╚══════════════════════════════════════════════════╝");
    eprintln!();

    // ── 2. Open counters & spawn the worker ──────────────────────
    let mut sampler = config
        .build(&registry)
        .context("failed to set up sampler")?;
    eprintln!(
        "📈 Sampling {} every {} ms ({:?}, {:?} schedule)",
        sampler.counter_names().join(", "),
        config.interval_ms,
        config.mode,
        config.schedule,
    );

    // ── 3. Release the loop ──────────────────────────────────────
    tokio::time::sleep(config.start_delay()).await;
    let started_at = Utc::now();
    sampler.start(Duration::ZERO);

    // ── 4. Hold the window open ──────────────────────────────────
    match config.duration() {
        Some(window) => {
            tokio::select! {
                _ = tokio::time::sleep(window) => {}
                signal = tokio::signal::ctrl_c() => {
                    signal.context("failed to listen for Ctrl-C")?;
                    tracing::info!("interrupted, stopping early");
                }
            }
        }
        None => {
            eprintln!("   press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
        }
    }

    // ── 5. Stop & collect (joins the worker, so off the runtime) ─
    let (sampler, values) = tokio::task::spawn_blocking(move || {
        let values = sampler.stop(Duration::ZERO);
        (sampler, values)
    })
    .await
    .context("sampling worker failed")?;

    let report = RunReport::new(&sampler, &values, started_at, Utc::now());
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        print!("{}", report.render());
    }

    Ok(())
}
