// src/types.rs

/// Where the training protocol currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Relaxing,
    Contracting,
    Complete,
}
/// State change produced by one protocol update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    None,
    /// Same cycle, next output class.
    NextOutput,
    /// First class of the next collection cycle.
    NextCycle,
    Complete,
}
/// Result of advancing the sequencer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrainingStep {
    pub phase: Phase,
    pub recording: bool,
    pub current_output: usize,
    pub current_cycle: usize,
    /// Informational only; negative while contracting.
    pub time_to_next_phase_ms: f64,
    pub transition: Transition,
}
/// Counters kept by the sampling thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub ticks: u64,
    pub records_written: u64,
    /// Ticks dropped because the provider failed.
    pub skipped_ticks: u64,
    /// Ticks whose work ran past the following deadline.
    pub overruns: u64,
}
