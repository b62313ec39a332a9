//! Configuration loading and management.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Project-level config file, relative to the working directory.
pub const PROJECT_CONFIG: &str = ".multitask/config.yaml";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub feedback: FeedbackConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".multitask/tasks.db")
}

/// Audible feedback configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Ring the terminal bell on task completion and on errors.
    #[serde(default = "default_sound")]
    pub sound: bool,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            sound: default_sound(),
        }
    }
}

fn default_sound() -> bool {
    true
}

/// Parse a boolean environment value.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// User-level config file (`~/.multitask/config.yaml`).
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".multitask").join("config.yaml"))
    }

    /// Load configuration from default locations or return defaults, then
    /// apply environment overrides.
    pub fn load_or_default() -> Self {
        let candidates = std::iter::once(PathBuf::from(PROJECT_CONFIG)).chain(Self::user_config_path());

        let mut config = Self::default();
        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::load(&path) {
                Ok(loaded) => {
                    debug!(path = %path.display(), "Loaded configuration");
                    config = loaded;
                    break;
                }
                Err(err) => warn!(path = %path.display(), error = %err, "Ignoring unreadable config"),
            }
        }

        config.apply_env();
        config
    }

    /// Apply `MULTITASK_DB_PATH` and `MULTITASK_SOUND` overrides.
    pub fn apply_env(&mut self) {
        if let Ok(db_path) = std::env::var("MULTITASK_DB_PATH") {
            self.store.db_path = PathBuf::from(db_path);
        }

        if let Ok(sound) = std::env::var("MULTITASK_SOUND") {
            match parse_flag(&sound) {
                Some(sound) => self.feedback.sound = sound,
                None => warn!(value = %sound, "Ignoring invalid MULTITASK_SOUND"),
            }
        }
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.store.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
