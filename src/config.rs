use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use directories::ProjectDirs;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{Result, TodoError};

/// Deployed task service used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "https://todo-server-mongodb.onrender.com";

/// Environment variable overriding `api_url`.
pub const API_URL_ENV: &str = "TODO_API_URL";

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the task service
    pub api_url: String,

    /// Directory holding the local cache and preferences
    pub data_dir: PathBuf,

    /// How often the reminder scan runs (in seconds)
    pub reminder_interval_secs: u64,

    /// Size of the due-soon window (in minutes)
    pub due_soon_minutes: i64,

    /// Whether `watch` sends reminders at all
    pub reminders_enabled: bool,

    /// Optional HTTP timeout; the transport default applies when unset
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            data_dir: project_dirs()
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".todosync")),
            reminder_interval_secs: 60,
            due_soon_minutes: 10,
            reminders_enabled: true,
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Loads the configuration file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(|e| TodoError::ConfigError {
            message: format!("Failed to parse {}: {}", path.display(), e),
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|_| TodoError::DirectoryError {
                path: parent.to_path_buf(),
            })?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Location of the config file when `--config` is not given.
    pub fn default_path() -> PathBuf {
        project_dirs()
            .map(|dirs| dirs.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from(".todosync/config.json"))
    }

    /// Applies `TODO_API_URL` if set.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                debug!("Using API URL from {}", API_URL_ENV);
                self.api_url = url.trim().to_string();
            }
        }
    }

    /// Updates one setting from its textual form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key.trim() {
            "api_url" => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    return Err(config_error(format!("api_url must be an http(s) URL: {value}")));
                }
                self.api_url = value.to_string();
            }
            "data_dir" => self.data_dir = PathBuf::from(value),
            "reminder_interval_secs" => {
                let secs: u64 = parse_number(key, value)?;
                if secs == 0 {
                    return Err(config_error("reminder_interval_secs must be positive"));
                }
                self.reminder_interval_secs = secs;
            }
            "due_soon_minutes" => {
                let minutes: i64 = parse_number(key, value)?;
                if minutes <= 0 {
                    return Err(config_error("due_soon_minutes must be positive"));
                }
                self.due_soon_minutes = minutes;
            }
            "reminders_enabled" => {
                self.reminders_enabled = value
                    .parse()
                    .map_err(|_| config_error(format!("expected true or false, got {value}")))?;
            }
            "request_timeout_secs" => {
                self.request_timeout_secs = if value.is_empty() || value == "none" {
                    None
                } else {
                    Some(parse_number(key, value)?)
                };
            }
            other => {
                warn!("Attempt to set unknown config key {}", other);
                return Err(config_error(format!("Unknown setting: {other}")));
            }
        }
        Ok(())
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_secs)
    }

    pub fn due_soon_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.due_soon_minutes)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "todosync")
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| config_error(format!("{key} expects a number, got {value}")))
}

fn config_error(message: impl Into<String>) -> TodoError {
    TodoError::ConfigError {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.reminder_interval_secs, 60);
        assert_eq!(config.due_soon_minutes, 10);
    }

    #[test]
    fn save_then_load_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");
        let mut config = Config::default();
        config.set("api_url", "http://localhost:3000").unwrap();
        config.set("request_timeout_secs", "5").unwrap();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.api_url, "http://localhost:3000");
        assert_eq!(loaded.request_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn partial_file_fills_remaining_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"due_soon_minutes": 15}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.due_soon_minutes, 15);
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.set("api_url", "ftp://x").is_err());
        assert!(config.set("reminder_interval_secs", "0").is_err());
        assert!(config.set("due_soon_minutes", "soon").is_err());
        assert!(config.set("colour", "blue").is_err());
        assert_eq!(config, Config::default());
    }
}
