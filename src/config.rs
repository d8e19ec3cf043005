//! Driver configuration
//!
//! Stored as TOML at `~/.config/orione/driver.toml` by default. Every field
//! has a default, so a partial file (or none at all) is valid.

use orione_transport::SerialSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::keycodes::KeyCode;
use crate::keymap::{Keymap, KeymapError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot access config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Key repeat settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Minimum interval between two emits of a held key
    pub rate_limit_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { rate_limit_ms: 50 }
    }
}

impl DispatcherConfig {
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }
}

/// Profile switching combination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Minimum interval between two switches, also the combination window
    pub rate_limit_ms: u64,
    /// Keys held together to switch; the digit among them selects the profile
    pub modifiers: Vec<KeyCode>,
    /// Profile active at startup
    pub initial: u8,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            rate_limit_ms: 100,
            modifiers: Vec::new(),
            initial: crate::keymap::BASE_PROFILE,
        }
    }
}

impl ProfileConfig {
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }
}

/// Keymap file selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeymapConfig {
    /// Keymap TOML; the built-in layout when unset
    pub path: Option<PathBuf>,
}

/// Virtual input device settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Name shown by `evtest` and the desktop
    pub name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "Orione Virtual Keyboard".to_string(),
        }
    }
}

/// Complete driver configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub serial: SerialSettings,
    pub dispatcher: DispatcherConfig,
    pub profile: ProfileConfig,
    pub keymap: KeymapConfig,
    pub device: DeviceConfig,
}

impl DriverConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("orione")
            .join("driver.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_err)?;
        Ok(())
    }

    /// Keymap named by the config, or the built-in layout
    pub fn load_keymap(&self) -> Result<Keymap, KeymapError> {
        match &self.keymap.path {
            Some(path) => Keymap::load(path),
            None => Keymap::builtin(),
        }
    }
}
