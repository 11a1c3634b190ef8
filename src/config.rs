use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::LogConfig;

/// Engine tunables. Defaults implement the documented planner behavior;
/// overrides exist for experimentation, not per-user configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Beam width for accessory search.
    pub beam_width: usize,

    /// Upper bound on accessory slots per session.
    pub max_accessory_slots: usize,

    /// Session exercise-count bounds.
    pub min_exercises: usize,
    pub max_exercises: usize,

    /// Tolerated overshoot of the session timebox (fraction).
    pub time_epsilon: f64,

    /// Days an exercise counts as recently used.
    pub recency_window_days: u32,

    /// Clamp band for per-exercise set targets.
    pub set_target_min: u32,
    pub set_target_max: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            beam_width: 3,
            max_accessory_slots: 5,
            min_exercises: 3,
            max_exercises: 7,
            time_epsilon: 0.02,
            recency_window_days: 14,
            set_target_min: 2,
            set_target_max: 5,
        }
    }
}

/// Application configuration persisted as TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding catalog, history, and readiness JSON files.
    pub data_dir: PathBuf,

    /// Engine tunables.
    #[serde(default = "EngineConfig::default")]
    pub engine: EngineConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            engine: EngineConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("liftrs")
}

/// Default config file location (`~/.config/liftrs/config.toml` on Linux).
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("liftrs")
        .join("config.toml")
}

impl AppConfig {
    /// Load from a TOML file, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Persist to a TOML file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self)?;
        fs::write(path, raw).with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }
}
