use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::layout::LayoutMetrics;

pub const API_URL_ENV: &str = "MUNGLOG_API_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config directory on this system")]
    NoConfigDir,

    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not write config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Client settings kept in `munglog.toml` under the user's config directory.
/// Tokens are deliberately absent: sessions live only in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// REST base, empty when the client should run on the demo table.
    pub base_url: String,
    pub email: String,
    /// Own member id, used to tell own messages from others'.
    pub member_id: i64,
    /// Broker endpoint; derived from `base_url` when unset.
    pub stomp_url: Option<String>,
    pub canvas: LayoutMetrics,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            email: String::new(),
            member_id: 0,
            stomp_url: None,
            canvas: LayoutMetrics::default(),
        }
    }
}

impl Settings {
    pub fn path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("munglog.toml"))
    }

    /// Load from the default location, falling back to defaults on any
    /// problem. `MUNGLOG_API_URL` wins over the file's `base_url`.
    pub fn load() -> Self {
        let mut settings = match Self::path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                warn!("ignoring {}: {e}", path.display());
                Self::default()
            }),
            _ => Self::default(),
        };
        if let Ok(url) = std::env::var(API_URL_ENV) {
            settings.base_url = crate::utils::normalize_url(&url);
        }
        settings
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn has_server(&self) -> bool {
        !self.base_url.is_empty()
    }
}
