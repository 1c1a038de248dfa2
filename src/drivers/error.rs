use std::path::PathBuf;
use thiserror::Error;
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("log i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("data provider failed: {0}")]
    Provider(#[source] anyhow::Error),
    #[error("channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("sampling was cancelled before the next deadline")]
    Cancelled,
    #[error("malformed session file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("session file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("sampler is running; stop it first")]
    AlreadyRunning,
    #[error("sampling thread panicked: {0}")]
    Panicked(String),
}
impl SamplerError {
    /// Per-tick errors are skipped; everything else ends the loop.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SamplerError::Provider(_))
    }
}
pub type Result<T> = std::result::Result<T, SamplerError>;
