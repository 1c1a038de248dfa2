// src/training.rs
use std::thread;
use std::time::{Duration, Instant};
use log::info;
use crate::config::TrainingConfig;
use crate::drivers::Result;
use crate::engine::Sampler;
use crate::recorder::LogWriter;
use crate::types::{Phase, TrainingStep, Transition};
/// Relax/contract protocol over `output_count` classes and
/// `collection_cycles` cycles, classes in order within each cycle.
///
/// Pure state machine: the caller measures time since the current phase began
/// and restarts that clock whenever a transition is reported.
#[derive(Clone, Debug)]
pub struct TrainingSequencer {
    config: TrainingConfig,
    current_output: usize,
    current_cycle: usize,
    active: bool,
    complete: bool,
    contraction_events: usize,
}
impl TrainingSequencer {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            current_output: 0,
            current_cycle: 0,
            active: false,
            complete: false,
            contraction_events: 0,
        })
    }
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }
    pub fn start(&mut self) {
        self.current_output = 0;
        self.current_cycle = 0;
        self.active = true;
        self.complete = false;
        self.contraction_events = 0;
    }
    /// Terminal until the next `start`.
    pub fn end(&mut self) {
        self.active = false;
        self.complete = true;
    }
    pub fn is_active(&self) -> bool {
        self.active
    }
    pub fn is_complete(&self) -> bool {
        self.complete
    }
    pub fn current_output(&self) -> usize {
        self.current_output
    }
    pub fn current_cycle(&self) -> usize {
        self.current_cycle
    }
    /// Finished relax + contract phases so far.
    pub fn contraction_events(&self) -> usize {
        self.contraction_events
    }
    pub fn phase_ms(&self) -> f64 {
        self.config.phase_ms() as f64
    }
    pub fn time_to_next_phase(&self, elapsed_ms: f64) -> f64 {
        self.config.relax_ms as f64 - elapsed_ms
    }
    pub fn phase_at(&self, elapsed_ms: f64) -> Phase {
        if self.complete {
            Phase::Complete
        } else if !self.active {
            Phase::Idle
        } else if elapsed_ms >= self.config.relax_ms as f64 {
            Phase::Contracting
        } else {
            Phase::Relaxing
        }
    }
    /// Evaluate the protocol `elapsed_ms` after the current phase began.
    ///
    /// At most one transition happens per call. After `NextOutput` or
    /// `NextCycle` the returned flags describe the new phase at
    /// `elapsed_ms - phase_ms()`.
    pub fn advance(&mut self, elapsed_ms: f64) -> TrainingStep {
        if !self.active {
            return self.step(elapsed_ms, Transition::None);
        }
        let phase_ms = self.phase_ms();
        if elapsed_ms < phase_ms {
            return self.step(elapsed_ms, Transition::None);
        }
        self.contraction_events += 1;
        let transition = if self.current_output + 1 < self.config.output_count {
            self.current_output += 1;
            Transition::NextOutput
        } else if self.current_cycle + 1 < self.config.collection_cycles {
            self.current_cycle += 1;
            self.current_output = 0;
            Transition::NextCycle
        } else {
            self.end();
            Transition::Complete
        };
        self.step(elapsed_ms - phase_ms, transition)
    }
    fn step(&self, elapsed_ms: f64, transition: Transition) -> TrainingStep {
        let phase = self.phase_at(elapsed_ms);
        TrainingStep {
            phase,
            recording: phase == Phase::Contracting,
            current_output: self.current_output,
            current_cycle: self.current_cycle,
            time_to_next_phase_ms: self.time_to_next_phase(elapsed_ms),
            transition,
        }
    }
}
/// A sampler driven by the training protocol: recording is on only while
/// contracting, and every record carries the current class as its label.
pub struct TrainingSession {
    sampler: Sampler,
    sequencer: TrainingSequencer,
    phase_start: Instant,
}
impl TrainingSession {
    pub fn new(sampler: Sampler, config: TrainingConfig) -> Result<Self> {
        Ok(Self {
            sampler,
            sequencer: TrainingSequencer::new(config)?,
            phase_start: Instant::now(),
        })
    }
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }
    pub fn sequencer(&self) -> &TrainingSequencer {
        &self.sequencer
    }
    pub fn is_active(&self) -> bool {
        self.sequencer.is_active()
    }
    pub fn is_complete(&self) -> bool {
        self.sequencer.is_complete()
    }
    /// Reset the protocol to class 0 of cycle 0 and start sampling into `log`.
    pub fn start_data_collection(&mut self, log: LogWriter) -> Result<()> {
        self.sampler.stop()?;
        self.sampler.attach_log(log)?;
        self.sampler.set_recording_label(false, Some(0));
        self.sequencer.start();
        self.phase_start = Instant::now();
        self.sampler.start()?;
        let cfg = self.sequencer.config();
        info!(
            "training started: {} outputs x {} cycles, relax {} ms, contract {} ms",
            cfg.output_count, cfg.collection_cycles, cfg.relax_ms, cfg.contraction_ms
        );
        Ok(())
    }
    /// Advance the protocol to "now" and push the result into the sampler.
    pub fn update(&mut self) -> Result<TrainingStep> {
        if self.sequencer.is_active() && !self.sampler.is_running() {
            // The sampling thread died on a fatal error; surface it and stop here.
            self.sequencer.end();
            self.finish()?;
        }
        let elapsed_ms = self.phase_start.elapsed().as_secs_f64() * 1000.0;
        let step = self.sequencer.advance(elapsed_ms);
        match step.transition {
            Transition::None => {}
            Transition::NextOutput | Transition::NextCycle => {
                // Additive restart keeps late polls from stretching later phases.
                self.phase_start += Duration::from_millis(self.sequencer.config().phase_ms());
                info!(
                    "next: output {} of cycle {}",
                    step.current_output, step.current_cycle
                );
            }
            Transition::Complete => {
                self.finish()?;
                return Ok(step);
            }
        }
        if self.sequencer.is_active() {
            self.sampler
                .set_recording_label(step.recording, Some(step.current_output));
        }
        Ok(step)
    }
    /// Stop sampling, finalize the log and mark the protocol complete.
    pub fn end_data_collection(&mut self) -> Result<()> {
        self.sequencer.end();
        self.finish()
    }
    /// Poll `update` every `poll_interval` until the protocol completes.
    ///
    /// Recording and the label switch at most one `poll_interval` after each
    /// phase boundary, so up to `poll_interval * frequency_hz` samples at the
    /// start of a relax phase may still carry the previous class.
    pub fn run(&mut self, poll_interval: Duration) -> Result<()> {
        while self.sequencer.is_active() {
            self.update()?;
            if self.sequencer.is_active() {
                thread::sleep(poll_interval);
            }
        }
        Ok(())
    }
    fn finish(&mut self) -> Result<()> {
        self.sampler.set_recording(false);
        let closed = self.sampler.close();
        info!(
            "training complete after {} contractions",
            self.sequencer.contraction_events()
        );
        closed
    }
}
