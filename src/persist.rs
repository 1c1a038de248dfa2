//! Session files: configuration objects stored as pretty JSON.
//!
//! Paths without an extension get `.json` appended on both save and load, so
//! `save("profile", ..)` and `load("profile")` meet at `profile.json`.
use std::fs;
use std::path::{Path, PathBuf};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use crate::config::{LoggerConfig, SessionConfig, TrainingConfig};
use crate::drivers::{Result, SamplerError};
pub const EXTENSION: &str = "json";
/// A stored profile that remembers which kind of session it describes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionProfile {
    Logger {
        logger: LoggerConfig,
    },
    Training {
        logger: LoggerConfig,
        training: TrainingConfig,
    },
}
impl SessionProfile {
    pub fn logger(&self) -> &LoggerConfig {
        match self {
            SessionProfile::Logger { logger } | SessionProfile::Training { logger, .. } => logger,
        }
    }
    pub fn training(&self) -> Option<&TrainingConfig> {
        match self {
            SessionProfile::Logger { .. } => None,
            SessionProfile::Training { training, .. } => Some(training),
        }
    }
}
impl From<&SessionConfig> for SessionProfile {
    fn from(cfg: &SessionConfig) -> Self {
        match &cfg.training {
            Some(training) => SessionProfile::Training {
                logger: cfg.logger.clone(),
                training: training.clone(),
            },
            None => SessionProfile::Logger {
                logger: cfg.logger.clone(),
            },
        }
    }
}
pub fn with_extension(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(EXTENSION)
    }
}
/// Serialize `value` and return the path it was written to.
pub fn save<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<PathBuf> {
    let path = with_extension(path);
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&path, json)?;
    log::debug!("saved {}", path.display());
    Ok(path)
}
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = with_extension(path);
    if !path.is_file() {
        return Err(SamplerError::NotFound(path));
    }
    let text = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&text)?)
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn appends_missing_extension_only() {
        assert_eq!(with_extension("a/profile"), PathBuf::from("a/profile.json"));
        assert_eq!(with_extension("a/profile.cfg"), PathBuf::from("a/profile.cfg"));
    }
    #[test]
    fn config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = SessionConfig {
            logger: LoggerConfig {
                frequency_hz: 1000.0,
                channel_count: 8,
                history_depth: 64,
                precision: 6,
            },
            training: Some(TrainingConfig {
                relax_ms: 1500,
                contraction_ms: 2500,
                output_count: 5,
                collection_cycles: 3,
            }),
            output_path: PathBuf::from("out.csv"),
            duration_ms: 1234,
            ..SessionConfig::default()
        };
        let written = save(dir.path().join("session"), &cfg).unwrap();
        assert_eq!(written.extension().unwrap(), "json");
        let loaded: SessionConfig = load(dir.path().join("session")).unwrap();
        assert_eq!(loaded, cfg);
    }
    #[test]
    fn profile_keeps_its_kind() {
        let dir = tempfile::tempdir().unwrap();
        let profiles = [
            SessionProfile::Logger {
                logger: LoggerConfig::default(),
            },
            SessionProfile::from(&SessionConfig {
                training: Some(TrainingConfig::default()),
                ..SessionConfig::default()
            }),
        ];
        for (i, profile) in profiles.iter().enumerate() {
            let path = save(dir.path().join(format!("p{i}")), profile).unwrap();
            let loaded: SessionProfile = load(&path).unwrap();
            assert_eq!(&loaded, profile);
        }
        let text = fs::read_to_string(dir.path().join("p1.json")).unwrap();
        assert!(text.contains(r#""kind": "training""#));
        assert!(profiles[0].training().is_none());
        assert_eq!(profiles[1].training(), Some(&TrainingConfig::default()));
        assert_eq!(profiles[1].logger(), &LoggerConfig::default());
    }
    #[test]
    fn missing_and_malformed_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load::<SessionConfig>(dir.path().join("nope"));
        assert!(matches!(missing, Err(SamplerError::NotFound(_))));
        fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        let bad = load::<SessionConfig>(dir.path().join("bad"));
        assert!(matches!(bad, Err(SamplerError::Parse(_))));
    }
}
