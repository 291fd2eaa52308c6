//! Monitor configuration, stored as TOML.
//!
//! Missing sections and fields fall back to defaults, so an empty file is a
//! valid configuration. A missing file is created with the defaults; a file
//! that does not parse is an error.

use crate::mqtt::{ManagerSettings, MqttConfig};
use crate::telemetry::DEFAULT_LOG_CAPACITY;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "telemetry-monitor";
const CONFIG_FILE: &str = "config.toml";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub mqtt: MqttConfig,
    pub monitor: MonitorSettings,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MonitorSettings {
    /// Entries kept in the message log
    pub log_capacity: usize,
    /// Deliveries buffered between the transport and the manager task
    pub event_capacity: usize,
    /// Log every vehicle_status report as a Status entry
    pub log_status_updates: bool,
    /// One of trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        MonitorSettings {
            log_capacity: DEFAULT_LOG_CAPACITY,
            event_capacity: 256,
            log_status_updates: false,
            log_level: "info".to_string(),
        }
    }
}

impl MonitorSettings {
    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            log_capacity: self.log_capacity,
            event_capacity: self.event_capacity,
            log_status_updates: self.log_status_updates,
        }
    }

    /// Falls back to INFO for unknown level names.
    pub fn level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level {:?}, using info", self.log_level);
            tracing::Level::INFO
        })
    }
}

impl MonitorConfig {
    /// `$XDG_CONFIG_HOME/telemetry-monitor/config.toml` or its platform equivalent.
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| eyre!("Failed to parse config: {}", e))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre!("Failed to serialize config: {}", e))
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config = Self::from_toml(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads `path`, writing the defaults there first if it does not exist.
    pub async fn load_or_create(path: &Path) -> Result<Self> {
        if tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            return Self::load(path).await;
        }

        let config = Self::default();
        if let Err(e) = config.save(path).await {
            // read-only config dirs are fine, the defaults still apply
            warn!("Could not write default config: {}", e);
        }
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }
        tokio::fs::write(path, self.to_toml()?)
            .await
            .map_err(|e| eyre!("Failed to write config file: {}", e))?;
        debug!("Wrote config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = MonitorConfig::from_toml("").unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert_eq!(config.monitor.log_capacity, 100);
        assert_eq!(config.mqtt.keep_alive_secs, 60);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = MonitorConfig::from_toml(
            r#"
            [mqtt.server]
            url = "tcp://192.168.41.250:1883"

            [monitor]
            log_status_updates = true
            log_level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.mqtt.server.url, "tcp://192.168.41.250:1883");
        assert_eq!(config.mqtt.subbed_topics.len(), 6);
        assert!(config.monitor.log_status_updates);
        assert_eq!(config.monitor.level(), tracing::Level::DEBUG);
        assert_eq!(config.monitor.event_capacity, 256);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(MonitorConfig::from_toml("[mqtt\nurl = ").is_err());
        assert!(MonitorConfig::from_toml("[monitor]\nlog_capacity = \"many\"").is_err());
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        let settings = MonitorSettings {
            log_level: "loud".into(),
            ..MonitorSettings::default()
        };
        assert_eq!(settings.level(), tracing::Level::INFO);
    }

    #[tokio::test]
    async fn creates_default_file_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = MonitorConfig::load_or_create(&path).await.unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert!(path.exists());

        let reloaded = MonitorConfig::load(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }

    #[tokio::test]
    async fn existing_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        tokio::fs::write(&path, "[monitor]\nlog_capacity = 5\n")
            .await
            .unwrap();

        let config = MonitorConfig::load_or_create(&path).await.unwrap();
        assert_eq!(config.monitor.log_capacity, 5);
    }
}
