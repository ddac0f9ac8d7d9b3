// Engine settings
// Loaded from ~/.config/cellgrid/settings.json (or settings.toml)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::locale::Locale;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("cannot serialize settings: {0}")]
    Serialize(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // History
    #[serde(rename = "history.maxEntries")]
    pub history_max_entries: usize,

    // New sheets
    #[serde(rename = "sheet.defaultRows")]
    pub default_rows: usize,

    #[serde(rename = "sheet.defaultCols")]
    pub default_cols: usize,

    // Notifications
    #[serde(rename = "notifications.stickyErrors")]
    pub sticky_errors: bool,

    // Locale
    #[serde(rename = "locale", default)]
    pub locale: Locale,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_max_entries: 100,
            default_rows: 100,
            default_cols: 26,
            sticky_errors: true,
            locale: Locale::default(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cellgrid");
        config_dir.join("settings.json")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{}; using default settings", e);
                Self::default()
            }
        }
    }

    /// Load settings from an explicit path. `.toml` files are read as TOML,
    /// anything else as JSON with `//` comment lines allowed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_err = |message: String| ConfigError::Parse { path: path.to_path_buf(), message };

        let mut settings: Settings = if is_toml(path) {
            toml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?
        } else {
            // Strip comments (lines starting with //)
            let cleaned: String = contents
                .lines()
                .filter(|line| !line.trim().starts_with("//"))
                .collect::<Vec<_>>()
                .join("\n");
            serde_json::from_str(&cleaned).map_err(|e| parse_err(e.to_string()))?
        };

        if !settings.locale.is_valid() {
            log::warn!(
                "locale '{}' in {} has conflicting separators; using en-US",
                settings.locale.code,
                path.display()
            );
            settings.locale = Locale::default();
        }
        if settings.default_rows == 0 || settings.default_cols == 0 {
            return Err(parse_err("sheet dimensions must be positive".to_string()));
        }
        Ok(settings)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io { path: path.to_path_buf(), source };

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let text = if is_toml(path) {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        };
        fs::write(path, text).map_err(io_err)
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "toml")
}
