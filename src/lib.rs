//! Periodic multi-channel sampling with CSV logging, rolling per-channel
//! history, and a relax/contract training protocol that labels recorded
//! samples with the class being trained.
pub mod config;
pub mod drivers;
pub mod engine;
pub mod persist;
pub mod recorder;
pub mod training;
pub mod types;
pub use config::{LoggerConfig, SessionConfig, SourceConfig, TrainingConfig};
pub use drivers::{HistorySnapshot, ManualSource, SampleProvider, SamplerError, SimulatedSource};
pub use engine::Sampler;
pub use recorder::{CsvFormatter, LogRecord, LogWriter, RecordFormatter};
pub use training::{TrainingSequencer, TrainingSession};
pub use types::{Phase, SamplerStats, TrainingStep, Transition};
