// src/config.rs
use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::drivers::{Result, SamplerError};
/// Largest number of decimals the log writer will render.
pub const MAX_PRECISION: usize = 12;
/// Sampling parameters. Frozen for the lifetime of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub frequency_hz: f64,
    pub channel_count: usize,
    /// Samples kept per channel for live display; 0 disables history.
    pub history_depth: usize,
    /// Decimal places used for every numeric field in the log.
    pub precision: usize,
}
impl Default for LoggerConfig {
    fn default() -> Self {
        // Cyton + Daisy: 16 channels at 250 Hz, two seconds of history.
        Self {
            frequency_hz: 250.0,
            channel_count: 16,
            history_depth: 500,
            precision: 4,
        }
    }
}
impl LoggerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(SamplerError::InvalidConfig(format!(
                "frequency must be a positive number of Hz, got {}",
                self.frequency_hz
            )));
        }
        if self.period().is_zero() {
            return Err(SamplerError::InvalidConfig(format!(
                "frequency {} Hz is too high for a nanosecond timer",
                self.frequency_hz
            )));
        }
        if self.channel_count == 0 {
            return Err(SamplerError::InvalidConfig(
                "channel count must be at least 1".into(),
            ));
        }
        if self.precision > MAX_PRECISION {
            return Err(SamplerError::InvalidConfig(format!(
                "precision {} exceeds the maximum of {MAX_PRECISION}",
                self.precision
            )));
        }
        Ok(())
    }
    pub fn period(&self) -> Duration {
        Duration::from_nanos((1.0e9 / self.frequency_hz).round() as u64)
    }
    pub fn period_ms(&self) -> f64 {
        1000.0 / self.frequency_hz
    }
    pub fn history_enabled(&self) -> bool {
        self.history_depth > 0
    }
}
/// Relax/contract protocol timing and class layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub relax_ms: u64,
    pub contraction_ms: u64,
    /// Number of output classes cycled through per collection cycle.
    pub output_count: usize,
    pub collection_cycles: usize,
}
impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            relax_ms: 1000,
            contraction_ms: 2000,
            output_count: 2,
            collection_cycles: 2,
        }
    }
}
impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.output_count == 0 {
            return Err(SamplerError::InvalidConfig(
                "training needs at least one output class".into(),
            ));
        }
        if self.collection_cycles == 0 {
            return Err(SamplerError::InvalidConfig(
                "training needs at least one collection cycle".into(),
            ));
        }
        if self.contraction_ms == 0 {
            return Err(SamplerError::InvalidConfig(
                "contraction time must be positive".into(),
            ));
        }
        Ok(())
    }
    /// Length of one relax + contract phase.
    pub fn phase_ms(&self) -> u64 {
        self.relax_ms + self.contraction_ms
    }
    pub fn total_contractions(&self) -> usize {
        self.output_count * self.collection_cycles
    }
    pub fn total_duration(&self) -> Duration {
        Duration::from_millis(self.phase_ms() * self.total_contractions() as u64)
    }
}
/// Where samples come from in the headless binary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SourceConfig {
    Simulated { amplitude: f64, noise: f64, seed: u64 },
}
impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Simulated {
            amplitude: 50.0,
            noise: 5.0,
            seed: 42,
        }
    }
}
/// Everything the binary needs to run one session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub logger: LoggerConfig,
    /// When present the session follows the training protocol.
    pub training: Option<TrainingConfig>,
    pub output_path: PathBuf,
    /// Length of a plain (non-training) session.
    pub duration_ms: u64,
    pub source: SourceConfig,
}
impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            logger: LoggerConfig::default(),
            training: None,
            output_path: PathBuf::from("session_data.csv"),
            duration_ms: 10_000,
            source: SourceConfig::default(),
        }
    }
}
impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        self.logger.validate()?;
        if let Some(training) = &self.training {
            training.validate()?;
        }
        Ok(())
    }
}
