//! CLI configuration.

use anyhow::Result;
use chatstream_core::session::DEFAULT_WELCOME_MESSAGE;
use chatstream_core::{MAX_FEED_ACTIVITIES, SessionManagerConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_feed_capacity")]
    pub activity_feed_capacity: usize,
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chatstream")
        .join("sessions.db")
}

fn default_feed_capacity() -> usize {
    MAX_FEED_ACTIVITIES
}

fn default_welcome_message() -> String {
    DEFAULT_WELCOME_MESSAGE.to_string()
}

fn default_title_max_chars() -> usize {
    50
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            activity_feed_capacity: default_feed_capacity(),
            welcome_message: default_welcome_message(),
            title_max_chars: default_title_max_chars(),
        }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config from default location (config/default.toml) or fall back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from("config/default.toml");
        if config_path.exists() {
            return Self::load_from(&config_path);
        }

        Ok(Config::default())
    }

    pub fn session_config(&self) -> SessionManagerConfig {
        SessionManagerConfig {
            welcome_message: self.welcome_message.clone(),
            title_max_chars: self.title_max_chars,
            activity_feed_capacity: self.activity_feed_capacity,
        }
    }
}
