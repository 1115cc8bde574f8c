/*!
Configuration for the last-updated log store
*/

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Record store settings
    pub store: RecordStoreConfig,
    /// Retention settings for the cleanup task
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordStoreConfig {
    /// Path to the log store database
    pub db_path: PathBuf,
    /// Whether the store accepts events at all
    pub enabled: bool,
    /// Whether event detail is serialized as JSON alongside the timestamp
    pub jsonformat: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    /// How long to keep records, in days; 0 keeps them forever
    pub loglifetime_days: u32,
    /// How often the cleanup task runs, in seconds
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store: RecordStoreConfig {
                db_path: default_db_path(),
                enabled: true,
                jsonformat: true,
            },
            retention: RetentionConfig {
                loglifetime_days: 0,
                sweep_interval_secs: 3600,
            },
        }
    }
}

impl StoreConfig {
    /// Load the configuration from a TOML file.
    pub async fn from_file<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = tokio::fs::read_to_string(path).await?;
        let config: StoreConfig = toml::from_str(&contents)?;
        Ok(config)
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("logstore_lastupdated").join("log.db"))
        .unwrap_or_else(|| PathBuf::from("./logstore_lastupdated.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_retain_forever() {
        let config = StoreConfig::default();
        assert!(config.store.enabled);
        assert!(config.store.jsonformat);
        assert_eq!(config.retention.loglifetime_days, 0);
    }

    #[test]
    fn parses_toml() {
        let config: StoreConfig = toml::from_str(
            r#"
            [store]
            db_path = "/var/lib/logstore/log.db"
            enabled = true
            jsonformat = false

            [retention]
            loglifetime_days = 35
            sweep_interval_secs = 86400
            "#,
        )
        .unwrap();
        assert_eq!(config.store.db_path, PathBuf::from("/var/lib/logstore/log.db"));
        assert!(!config.store.jsonformat);
        assert_eq!(config.retention.loglifetime_days, 35);
    }
}
