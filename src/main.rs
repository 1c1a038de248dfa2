// src/main.rs
use std::thread;
use std::time::{Duration, Instant};
use anyhow::{Context, Result};
use log::info;
use neurologger::{
    persist, CsvFormatter, LogWriter, Sampler, SamplerError, SessionConfig, SimulatedSource,
    SourceConfig, TrainingSession,
};
const DEFAULT_SESSION_FILE: &str = "neurologger.json";
/// Cadence of protocol updates; bounds how late a phase boundary can be applied.
const TRAINING_POLL: Duration = Duration::from_millis(2);
const REPORT_EVERY: Duration = Duration::from_secs(1);
fn load_session(path: &str) -> Result<SessionConfig> {
    match persist::load::<SessionConfig>(path) {
        Ok(cfg) => Ok(cfg),
        Err(SamplerError::NotFound(missing)) => {
            let cfg = SessionConfig::default();
            let written = persist::save(&missing, &cfg)?;
            info!("no session file found; wrote defaults to {}", written.display());
            Ok(cfg)
        }
        Err(e) => Err(e).with_context(|| format!("loading session file {path}")),
    }
}
fn run_plain(mut sampler: Sampler, log: LogWriter, duration: Duration) -> Result<()> {
    sampler.attach_log(log)?;
    sampler.start()?;
    let started = Instant::now();
    while started.elapsed() < duration && sampler.is_running() {
        thread::sleep(REPORT_EVERY.min(duration.saturating_sub(started.elapsed())));
        let stats = sampler.stats();
        let latest = sampler.data();
        info!(
            "{:>6.1}s  {} records  ch0 = {:.2}",
            started.elapsed().as_secs_f64(),
            stats.records_written,
            latest.first().copied().unwrap_or_default()
        );
    }
    sampler.close()?;
    Ok(())
}
fn main() -> Result<()> {
    env_logger::init();
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SESSION_FILE.to_owned());
    let cfg = load_session(&path)?;
    cfg.validate()?;
    let provider = match cfg.source {
        SourceConfig::Simulated {
            amplitude,
            noise,
            seed,
        } => SimulatedSource::new(
            cfg.logger.channel_count,
            cfg.logger.frequency_hz,
            amplitude,
            noise,
            seed,
        ),
    };
    let sampler = Sampler::new(cfg.logger.clone(), provider)?;
    let log = LogWriter::create(&cfg.output_path, CsvFormatter::new(cfg.logger.precision))
        .with_context(|| format!("creating {}", cfg.output_path.display()))?;
    match cfg.training {
        Some(training) => {
            let mut session = TrainingSession::new(sampler, training)?;
            session.start_data_collection(log)?;
            session.run(TRAINING_POLL)?;
        }
        None => run_plain(sampler, log, Duration::from_millis(cfg.duration_ms))?,
    }
    Ok(())
}
