// src/engine.rs
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use anyhow::anyhow;
use log::{debug, error, info, warn};
use crate::config::LoggerConfig;
use crate::drivers::{HistoryBuffer, HistorySnapshot, Result, SampleProvider, SamplerError, Scheduler};
use crate::recorder::{LogRecord, LogWriter};
use crate::types::SamplerStats;
/// Everything the sampling thread mutates. One tick's worth of work happens
/// under a single lock, so readers never see a half-applied frame.
struct Shared {
    provider: Box<dyn SampleProvider>,
    latest: Vec<f64>,
    history: Option<HistoryBuffer>,
    log: Option<LogWriter>,
    recording: bool,
    label: Option<usize>,
    baseline: Instant,
    stats: SamplerStats,
    fault: Option<String>,
}
impl Shared {
    fn sample_once(&mut self, channel_count: usize) -> Result<()> {
        let provider = &mut self.provider;
        let frame = panic::catch_unwind(AssertUnwindSafe(|| provider.next_sample()))
            .unwrap_or_else(|payload| {
                Err(anyhow!("provider panicked: {}", panic_message(&*payload)))
            })
            .map_err(SamplerError::Provider)?;
        if frame.len() != channel_count {
            return Err(SamplerError::ChannelMismatch {
                expected: channel_count,
                actual: frame.len(),
            });
        }
        let elapsed_ms = self.baseline.elapsed().as_secs_f64() * 1000.0;
        if self.recording {
            if let Some(log) = self.log.as_mut() {
                log.write_record(&LogRecord {
                    elapsed_ms,
                    values: &frame,
                    label: self.label,
                })?;
                self.stats.records_written += 1;
            }
        }
        if let Some(history) = self.history.as_mut() {
            history.push_frame(&frame)?;
        }
        self.latest = frame;
        Ok(())
    }
}
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    // State is consistent at every tick boundary, so a poisoned lock is still usable.
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
/// Periodic sampling session.
///
/// Owns the provider, the optional log destination and the live history.
/// `start` spawns one dedicated OS thread that busy-waits on a [`Scheduler`];
/// `stop` asks it to finish cooperatively and joins it, so a record is either
/// written whole or not at all.
pub struct Sampler {
    config: LoggerConfig,
    shared: Arc<Mutex<Shared>>,
    cancel: Arc<AtomicBool>,
    rebase: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<()>>>,
}
impl Sampler {
    pub fn new(config: LoggerConfig, provider: impl SampleProvider + 'static) -> Result<Self> {
        config.validate()?;
        let shared = Shared {
            provider: Box::new(provider),
            latest: Vec::new(),
            history: None,
            log: None,
            recording: true,
            label: None,
            baseline: Instant::now(),
            stats: SamplerStats::default(),
            fault: None,
        };
        Ok(Self {
            config,
            shared: Arc::new(Mutex::new(shared)),
            cancel: Arc::new(AtomicBool::new(false)),
            rebase: Arc::new(AtomicBool::new(false)),
            handle: None,
        })
    }
    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }
    /// Install the log destination. Only allowed while idle.
    pub fn attach_log(&mut self, writer: LogWriter) -> Result<()> {
        if self.is_running() {
            return Err(SamplerError::AlreadyRunning);
        }
        let previous = lock(&self.shared).log.replace(writer);
        if let Some(mut previous) = previous {
            previous.close()?;
        }
        Ok(())
    }
    pub fn set_recording(&self, recording: bool) {
        lock(&self.shared).recording = recording;
    }
    pub fn is_recording(&self) -> bool {
        lock(&self.shared).recording
    }
    /// Label appended to every record from now on; `None` writes plain rows.
    pub fn set_label(&self, label: Option<usize>) {
        lock(&self.shared).label = label;
    }
    /// Switch recording and label together so no tick sees one without the other.
    pub fn set_recording_label(&self, recording: bool, label: Option<usize>) {
        let mut state = lock(&self.shared);
        state.recording = recording;
        state.label = label;
    }
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
    /// Begin sampling. The timing baseline and history are reset on every call;
    /// a thread that is already running is kept.
    pub fn start(&mut self) -> Result<()> {
        let mut clock = Scheduler::new(self.config.period());
        {
            let mut state = lock(&self.shared);
            state.baseline = clock.baseline();
            state.latest = vec![0.0; self.config.channel_count];
            state.history = self.config.history_enabled().then(|| {
                HistoryBuffer::zeroed(
                    self.config.channel_count,
                    self.config.history_depth,
                    self.config.frequency_hz,
                )
            });
        }
        if self.is_running() {
            debug!("sampler already running; timing baseline reset");
            self.rebase.store(true, Ordering::Release);
            return Ok(());
        }
        // Reap a thread that ended on a fault before starting over.
        if let Some(handle) = self.handle.take() {
            if let Err(e) = join(handle, &self.shared) {
                warn!("previous sampling run ended with: {e}");
            }
        }
        {
            let mut state = lock(&self.shared);
            state.stats = SamplerStats::default();
            state.fault = None;
        }
        self.cancel.store(false, Ordering::Release);
        self.rebase.store(false, Ordering::Release);
        clock.reset();
        lock(&self.shared).baseline = clock.baseline();
        let shared = Arc::clone(&self.shared);
        let cancel = Arc::clone(&self.cancel);
        let rebase = Arc::clone(&self.rebase);
        let channel_count = self.config.channel_count;
        let handle = thread::Builder::new()
            .name("sampler".into())
            .spawn(move || run_loop(&shared, &cancel, &rebase, clock, channel_count))?;
        self.handle = Some(handle);
        info!(
            "sampling {} channels at {} Hz",
            self.config.channel_count, self.config.frequency_hz
        );
        Ok(())
    }
    /// Cancel the sampling thread and wait for it. The tick in progress, if
    /// any, finishes first. Returns the fault that ended the loop, if one did.
    pub fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        self.cancel.store(true, Ordering::Release);
        let outcome = join(handle, &self.shared);
        {
            let mut state = lock(&self.shared);
            state.latest.clear();
            state.history = None;
            info!(
                "sampling stopped after {} ticks ({} records, {} skipped, {} overruns)",
                state.stats.ticks,
                state.stats.records_written,
                state.stats.skipped_ticks,
                state.stats.overruns
            );
        }
        outcome
    }
    /// `stop` followed by flushing and releasing the log. Safe to call twice.
    pub fn close(&mut self) -> Result<()> {
        let stopped = self.stop();
        let log = lock(&self.shared).log.take();
        let closed = match log {
            Some(mut log) => log.close(),
            None => Ok(()),
        };
        stopped.and(closed)
    }
    /// Copy of the most recent sample; empty while idle.
    pub fn data(&self) -> Vec<f64> {
        lock(&self.shared).latest.clone()
    }
    /// Copy of every channel window, or `None` when history is disabled or idle.
    pub fn history(&self) -> Option<HistorySnapshot> {
        lock(&self.shared).history.as_ref().map(HistoryBuffer::snapshot)
    }
    pub fn stats(&self) -> SamplerStats {
        lock(&self.shared).stats
    }
    /// Description of the error that terminated the loop, if any.
    pub fn fault(&self) -> Option<String> {
        lock(&self.shared).fault.clone()
    }
    /// Time since the current timing baseline.
    pub fn elapsed(&self) -> Duration {
        lock(&self.shared).baseline.elapsed()
    }
}
impl Drop for Sampler {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("sampler shut down with error: {e}");
        }
    }
}
fn join(handle: JoinHandle<Result<()>>, shared: &Mutex<Shared>) -> Result<()> {
    handle.join().unwrap_or_else(|payload| {
        let e = SamplerError::Panicked(panic_message(&*payload).to_owned());
        error!("{e}");
        let mut state = lock(shared);
        if state.fault.is_none() {
            state.fault = Some(e.to_string());
        }
        Err(e)
    })
}
fn run_loop(
    shared: &Mutex<Shared>,
    cancel: &AtomicBool,
    rebase: &AtomicBool,
    mut clock: Scheduler,
    channel_count: usize,
) -> Result<()> {
    loop {
        if rebase.swap(false, Ordering::AcqRel) {
            clock.reset();
            lock(shared).baseline = clock.baseline();
        }
        match clock.tick(cancel) {
            Ok(()) => {}
            Err(SamplerError::Cancelled) => return Ok(()),
            Err(e) => return Err(e),
        }
        let mut state = lock(shared);
        state.stats.ticks += 1;
        match state.sample_once(channel_count) {
            Ok(()) => {}
            Err(e) if e.is_recoverable() => {
                state.stats.skipped_ticks += 1;
                if state.stats.skipped_ticks % 1000 == 1 {
                    warn!(
                        "tick {} skipped: {e} ({} skipped so far)",
                        state.stats.ticks, state.stats.skipped_ticks
                    );
                }
            }
            Err(e) => {
                error!("sampling aborted: {e}");
                state.fault = Some(e.to_string());
                return Err(e);
            }
        }
        if clock.is_behind() {
            state.stats.overruns += 1;
            if state.stats.overruns % 1000 == 1 {
                warn!(
                    "tick {} overran its period ({} overruns so far)",
                    state.stats.ticks, state.stats.overruns
                );
            }
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::ManualSource;
    use crate::recorder::CsvFormatter;
    fn config(frequency_hz: f64, channel_count: usize, history_depth: usize) -> LoggerConfig {
        LoggerConfig {
            frequency_hz,
            channel_count,
            history_depth,
            precision: 4,
        }
    }
    /// Sample n on channel c is `n` for even c and `-n` for odd c.
    fn counter(channel_count: usize) -> impl SampleProvider + 'static {
        let mut n = 0.0;
        move || {
            n += 1.0;
            Ok::<_, anyhow::Error>(
                (0..channel_count)
                    .map(|c| if c % 2 == 0 { n } else { -n })
                    .collect(),
            )
        }
    }
    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }
    #[test]
    fn rejects_invalid_config() {
        let result = Sampler::new(config(0.0, 2, 0), counter(2));
        assert!(matches!(result, Err(SamplerError::InvalidConfig(_))));
        let result = Sampler::new(config(100.0, 0, 0), counter(0));
        assert!(matches!(result, Err(SamplerError::InvalidConfig(_))));
    }
    #[test]
    fn record_count_tracks_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.csv");
        let mut sampler = Sampler::new(config(200.0, 2, 0), counter(2)).unwrap();
        sampler
            .attach_log(LogWriter::create(&path, CsvFormatter::new(4)).unwrap())
            .unwrap();
        let started = Instant::now();
        sampler.start().unwrap();
        thread::sleep(Duration::from_millis(400));
        sampler.close().unwrap();
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        let expected = duration_ms * 200.0 / 1000.0;
        assert!(
            (lines.len() as f64 - expected).abs() <= 3.0,
            "{} records for {duration_ms:.1} ms",
            lines.len()
        );
        assert_eq!(sampler.stats().records_written, lines.len() as u64);
        let mut last_t = f64::MIN;
        for (i, line) in lines.iter().enumerate() {
            let fields: Vec<f64> = line.split(',').map(|f| f.parse().unwrap()).collect();
            assert_eq!(fields.len(), 3);
            assert!(fields[0] > last_t);
            last_t = fields[0];
            assert_eq!(fields[1], (i + 1) as f64);
            assert_eq!(fields[2], -((i + 1) as f64));
        }
        // First record lands one period after the baseline.
        let first_t: f64 = lines[0].split(',').next().unwrap().parse().unwrap();
        assert!(first_t >= 5.0 && first_t < 50.0, "first record at {first_t} ms");
    }
    #[test]
    fn history_holds_latest_window() {
        let mut sampler = Sampler::new(config(500.0, 2, 8), counter(2)).unwrap();
        sampler.start().unwrap();
        wait_until(|| sampler.stats().ticks >= 20);
        let snap = sampler.history().unwrap();
        sampler.stop().unwrap();
        assert_eq!(snap.num_channels(), 2);
        assert_eq!(snap.depth(), 8);
        let ch0 = snap.channel(0).unwrap();
        let ch1 = snap.channel(1).unwrap();
        for i in 1..8 {
            assert_eq!(ch0[i], ch0[i - 1] + 1.0);
        }
        assert!(ch0[0] >= 13.0);
        for (a, b) in ch0.iter().zip(ch1) {
            assert_eq!(*a, -*b);
        }
    }
    #[test]
    fn readers_never_see_partial_frames() {
        let mut sampler = Sampler::new(config(1000.0, 8, 16), counter(8)).unwrap();
        sampler.start().unwrap();
        let sampler = Arc::new(Mutex::new(sampler));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let sampler = Arc::clone(&sampler);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let (frame, history) = {
                            let s = sampler.lock().unwrap();
                            (s.data(), s.history().unwrap())
                        };
                        assert_eq!(frame.len(), 8);
                        let n = frame[0];
                        assert!(frame.iter().enumerate().all(|(c, v)| {
                            if c % 2 == 0 { *v == n } else { *v == -n }
                        }));
                        let newest: Vec<f64> = history.samples.iter().map(|w| w[15]).collect();
                        assert!(newest.iter().all(|v| v.abs() == newest[0].abs()));
                    }
                })
            })
            .collect();
        for reader in readers {
            reader.join().unwrap();
        }
        sampler.lock().unwrap().stop().unwrap();
    }
    #[test]
    fn provider_errors_skip_the_tick() {
        let mut calls = 0u32;
        let provider = move || {
            calls += 1;
            if calls % 3 == 0 {
                Err(anyhow!("device busy"))
            } else {
                Ok(vec![calls as f64])
            }
        };
        let mut sampler = Sampler::new(config(1000.0, 1, 4), provider).unwrap();
        sampler.start().unwrap();
        wait_until(|| sampler.stats().ticks >= 30);
        assert!(sampler.is_running());
        sampler.stop().unwrap();
        let stats = sampler.stats();
        assert!(stats.skipped_ticks >= 9);
        assert!(sampler.fault().is_none());
    }
    #[test]
    fn channel_mismatch_is_fatal() {
        let mut sampler = Sampler::new(config(1000.0, 3, 0), counter(2)).unwrap();
        sampler.start().unwrap();
        wait_until(|| !sampler.is_running());
        assert!(sampler.fault().unwrap().contains("expected 3, got 2"));
        assert!(matches!(
            sampler.stop(),
            Err(SamplerError::ChannelMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert!(sampler.stop().is_ok());
    }
    #[test]
    fn panicking_provider_skips_the_tick() {
        let mut calls = 0u32;
        let provider = move || {
            calls += 1;
            if calls == 5 {
                panic!("driver crashed");
            }
            Ok::<_, anyhow::Error>(vec![calls as f64])
        };
        let mut sampler = Sampler::new(config(1000.0, 1, 4), provider).unwrap();
        sampler.start().unwrap();
        wait_until(|| sampler.stats().ticks >= 20);
        assert!(sampler.is_running());
        assert_eq!(sampler.stats().skipped_ticks, 1);
        assert!(sampler.fault().is_none());
        sampler.stop().unwrap();
    }
    #[test]
    fn panic_outside_the_provider_is_a_fault() {
        struct Exploding;
        impl crate::recorder::RecordFormatter for Exploding {
            fn format(&self, _: &LogRecord<'_>, _: &mut String) {
                panic!("formatter bug");
            }
        }
        let mut sampler = Sampler::new(config(1000.0, 1, 0), counter(1)).unwrap();
        sampler
            .attach_log(LogWriter::from_writer(std::io::sink(), Exploding))
            .unwrap();
        sampler.start().unwrap();
        wait_until(|| !sampler.is_running());
        let stopped = sampler.close();
        assert!(matches!(&stopped, Err(SamplerError::Panicked(msg)) if msg == "formatter bug"));
        assert!(!stopped.unwrap_err().is_recoverable());
        assert!(sampler.fault().unwrap().contains("formatter bug"));
    }
    #[test]
    fn exhausted_source_keeps_sampling() {
        let source = ManualSource::new(vec![vec![1.0], vec![2.0]]);
        let mut sampler = Sampler::new(config(1000.0, 1, 4), source).unwrap();
        sampler.start().unwrap();
        wait_until(|| sampler.stats().skipped_ticks >= 50);
        assert!(sampler.is_running());
        assert_eq!(sampler.data(), vec![2.0]);
        assert!(sampler.fault().is_none());
        sampler.stop().unwrap();
    }
    #[test]
    fn recording_flag_gates_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gated.csv");
        let mut sampler = Sampler::new(config(1000.0, 1, 4), counter(1)).unwrap();
        sampler
            .attach_log(LogWriter::create(&path, CsvFormatter::new(1)).unwrap())
            .unwrap();
        sampler.set_recording(false);
        sampler.start().unwrap();
        wait_until(|| sampler.stats().ticks >= 10);
        assert_eq!(sampler.stats().records_written, 0);
        assert!(sampler.history().unwrap().channel(0).unwrap()[3] > 0.0);
        sampler.set_label(Some(2));
        sampler.set_recording(true);
        wait_until(|| sampler.stats().records_written >= 5);
        sampler.close().unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.lines().all(|l| l.ends_with(",2") && l.split(',').count() == 3));
    }
    #[test]
    fn lifecycle_is_idempotent() {
        let source = ManualSource::new(vec![vec![1.0, 2.0]]).looping();
        let mut sampler = Sampler::new(config(500.0, 2, 50), source).unwrap();
        assert!(sampler.data().is_empty());
        sampler.stop().unwrap();
        sampler.start().unwrap();
        assert!(matches!(
            sampler.attach_log(LogWriter::from_writer(std::io::sink(), CsvFormatter::default())),
            Err(SamplerError::AlreadyRunning)
        ));
        thread::sleep(Duration::from_millis(100));
        // Restarting while running keeps the thread but rebases timing.
        sampler.start().unwrap();
        assert!(sampler.is_running());
        let window = sampler.history().unwrap();
        assert!(sampler.elapsed() < Duration::from_millis(50));
        // The window was full of samples before; the restart refilled it with zeros.
        let zeros = window.channel(0).unwrap().iter().filter(|v| **v == 0.0).count();
        assert!(zeros >= 40, "only {zeros} of 50 slots reset");
        wait_until(|| sampler.data() == vec![1.0, 2.0]);
        sampler.close().unwrap();
        sampler.close().unwrap();
        assert!(!sampler.is_running());
        assert!(sampler.data().is_empty());
        assert!(sampler.history().is_none());
        // A stopped sampler can be started again.
        sampler.start().unwrap();
        wait_until(|| sampler.stats().ticks >= 3);
        sampler.stop().unwrap();
    }
}
