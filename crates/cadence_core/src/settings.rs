//! Runtime settings

use crate::time::DEFAULT_FRAME_RATE_HZ;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Tunables read once when a runtime is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Frames per second requested from the interval pacer.
    pub frame_rate_hz: u32,
    /// Let the external context hold back event trimming like a frame system.
    /// Turn off when the host never reads events, or its cursor pins every
    /// buffer.
    pub track_external_reader: bool,
    /// Warn when a single system invocation takes longer than this.
    pub slow_system_warn_ms: Option<f64>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            frame_rate_hz: DEFAULT_FRAME_RATE_HZ,
            track_external_reader: true,
            slow_system_warn_ms: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
}

impl RuntimeSettings {
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), ?settings, "loaded runtime settings");
        Ok(settings)
    }

    pub fn to_json_string(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
