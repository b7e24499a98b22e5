/*
 * Manages the client's settings: how often to poll the backend, how long to wait
 * for change events to settle, and the defaults of the import form. Settings live
 * in a JSON file in the per-user local configuration directory; a missing file
 * means defaults, and fields missing from an older file fall back individually.
 *
 * It uses a trait-based approach (`ConfigManagerOperations`) so views can be tested
 * against a mock. The concrete `CoreConfigManager` resolves its directory through
 * `path_utils`, or uses an explicit directory when constructed with one.
 */
use super::backend::STATE_CHANGED_EVENT;
use crate::core::path_utils;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CLIENT_CONFIG_FILENAME: &str = "client_config.json";
const MIN_POLL_INTERVAL_MS: u64 = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Configuration file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not determine project directory for configuration")]
    NoProjectDirectory,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub manager_poll_interval_ms: u64,
    pub app_state_poll_interval_ms: u64,
    pub change_debounce_ms: u64,
    pub default_import_port: u16,
    pub page_size: usize,
    pub change_event: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            manager_poll_interval_ms: 1_000,
            app_state_poll_interval_ms: 5_000,
            change_debounce_ms: 500,
            default_import_port: 8080,
            page_size: 10,
            change_event: STATE_CHANGED_EVENT.to_string(),
        }
    }
}

impl ClientConfig {
    // A zero interval would turn the poll loop into a busy loop.
    pub fn manager_poll_interval(&self) -> Duration {
        Duration::from_millis(self.manager_poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    pub fn app_state_poll_interval(&self) -> Duration {
        Duration::from_millis(self.app_state_poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    pub fn change_debounce(&self) -> Duration {
        Duration::from_millis(self.change_debounce_ms)
    }
}

pub trait ConfigManagerOperations: Send + Sync {
    fn load_config(&self, app_name: &str) -> Result<ClientConfig>;
    fn save_config(&self, app_name: &str, config: &ClientConfig) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct CoreConfigManager {
    config_dir: Option<PathBuf>,
}

impl CoreConfigManager {
    pub fn new() -> Self {
        CoreConfigManager { config_dir: None }
    }

    /// Reads and writes in `dir` instead of the per-user directory.
    pub fn with_config_dir(dir: impl Into<PathBuf>) -> Self {
        CoreConfigManager {
            config_dir: Some(dir.into()),
        }
    }

    fn config_file_path(&self, app_name: &str) -> Result<PathBuf> {
        let dir = match &self.config_dir {
            Some(dir) => dir.clone(),
            None => path_utils::get_base_app_config_local_dir(app_name)
                .ok_or(ConfigError::NoProjectDirectory)?,
        };
        Ok(dir.join(CLIENT_CONFIG_FILENAME))
    }
}

fn read_config_file(file_path: &Path) -> Result<Option<ClientConfig>> {
    if !file_path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(file_path)?;
    if contents.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&contents)?))
}

impl ConfigManagerOperations for CoreConfigManager {
    /*
     * Loads the settings for `app_name`. A missing or empty file yields the
     * defaults; a malformed file is an error so that it is not silently replaced.
     */
    fn load_config(&self, app_name: &str) -> Result<ClientConfig> {
        let file_path = self.config_file_path(app_name)?;
        log::trace!("CoreConfigManager: Loading client config from {file_path:?}");
        match read_config_file(&file_path)? {
            Some(config) => {
                log::debug!("CoreConfigManager: Loaded client config from {file_path:?}.");
                Ok(config)
            }
            None => {
                log::debug!(
                    "CoreConfigManager: No client config at {file_path:?}, using defaults."
                );
                Ok(ClientConfig::default())
            }
        }
    }

    fn save_config(&self, app_name: &str, config: &ClientConfig) -> Result<()> {
        let file_path = self.config_file_path(app_name)?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(config)?;
        fs::write(&file_path, payload)?;
        log::debug!("CoreConfigManager: Saved client config to {file_path:?}.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_gives_defaults() {
        // Arrange
        let dir = tempdir().unwrap();
        let manager = CoreConfigManager::with_config_dir(dir.path());

        // Act
        let config = manager.load_config("AnyApp").unwrap();

        // Assert
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.change_debounce(), Duration::from_millis(500));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        // Arrange
        let dir = tempdir().unwrap();
        let manager = CoreConfigManager::with_config_dir(dir.path().join("nested"));
        let config = ClientConfig {
            manager_poll_interval_ms: 2_500,
            default_import_port: 3128,
            ..ClientConfig::default()
        };

        // Act
        manager.save_config("AnyApp", &config).unwrap();
        let loaded = manager.load_config("AnyApp").unwrap();

        // Assert
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_missing_fields() {
        // Arrange
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CLIENT_CONFIG_FILENAME),
            r#"{"change_debounce_ms": 250}"#,
        )
        .unwrap();
        let manager = CoreConfigManager::with_config_dir(dir.path());

        // Act
        let config = manager.load_config("AnyApp").unwrap();

        // Assert
        assert_eq!(config.change_debounce_ms, 250);
        assert_eq!(config.manager_poll_interval_ms, 1_000);
        assert_eq!(config.change_event, STATE_CHANGED_EVENT);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CLIENT_CONFIG_FILENAME), "{ not json").unwrap();
        let manager = CoreConfigManager::with_config_dir(dir.path());

        match manager.load_config("AnyApp") {
            Err(ConfigError::Json(_)) => {}
            other => panic!("Expected a JSON error, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let config = ClientConfig {
            manager_poll_interval_ms: 0,
            ..ClientConfig::default()
        };
        assert_eq!(
            config.manager_poll_interval(),
            Duration::from_millis(MIN_POLL_INTERVAL_MS)
        );
    }
}
