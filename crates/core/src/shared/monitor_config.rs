use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    clamp_tolerance, DEFAULT_DETECTION_FREQUENCY, DEFAULT_FILE_RETENTION_DAYS,
    DEFAULT_MIN_MATCH_INTERVAL_SECS, DEFAULT_PREVIEW_EVERY, DEFAULT_TOLERANCE,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },
}

/// Defaults for submitted jobs and the on-disk output layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub tolerance: f64,
    pub detection_frequency: u32,
    pub output_dir: PathBuf,
    pub min_match_interval_secs: f64,
    pub file_retention_days: u32,
    pub preview_every: usize,
    pub detector_confidence: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            detection_frequency: DEFAULT_DETECTION_FREQUENCY,
            output_dir: PathBuf::from("output"),
            min_match_interval_secs: DEFAULT_MIN_MATCH_INTERVAL_SECS,
            file_retention_days: DEFAULT_FILE_RETENTION_DAYS,
            preview_every: DEFAULT_PREVIEW_EVERY,
            detector_confidence: 0.5,
        }
    }
}

impl MonitorConfig {
    /// Default settings file in the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Face Monitor").join("settings.json"))
    }

    /// Loads defaults, then the settings file, then environment overrides.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.normalized())
    }

    /// Applies `FACE_TOLERANCE`-style overrides from a key lookup.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = parse_env(&lookup, "FACE_TOLERANCE")? {
            self.tolerance = v;
        }
        if let Some(v) = parse_env(&lookup, "DETECTION_FREQUENCY")? {
            self.detection_frequency = v;
        }
        if let Some(v) = lookup("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = parse_env(&lookup, "MIN_DETECTION_INTERVAL")? {
            self.min_match_interval_secs = v;
        }
        if let Some(v) = parse_env(&lookup, "FILE_RETENTION_DAYS")? {
            self.file_retention_days = v;
        }
        if let Some(v) = parse_env(&lookup, "PREVIEW_EVERY")? {
            self.preview_every = v;
        }
        if let Some(v) = parse_env(&lookup, "DETECTOR_CONFIDENCE")? {
            self.detector_confidence = v;
        }
        *self = self.clone().normalized();
        Ok(())
    }

    fn normalized(mut self) -> Self {
        self.tolerance = clamp_tolerance(self.tolerance);
        self.detection_frequency = self.detection_frequency.max(1);
        self.preview_every = self.preview_every.max(1);
        if !self.min_match_interval_secs.is_finite() || self.min_match_interval_secs < 0.0 {
            self.min_match_interval_secs = 0.0;
        }
        self
    }
}

fn parse_env<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { key, value: raw }),
    }
}
