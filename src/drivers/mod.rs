// src/drivers/mod.rs
// Acquisition plumbing: timing, buffering, sources and their errors.
pub mod buffer;
pub mod clock;
pub mod error;
pub mod source;
pub use buffer::{HistoryBuffer, HistorySnapshot};
pub use clock::Scheduler;
pub use error::{Result, SamplerError};
pub use source::{ManualSource, SampleProvider, SimulatedSource};
