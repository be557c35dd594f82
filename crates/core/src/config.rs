//! Storage configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    APP_DIR_NAME, DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_DB_FILE_NAME,
    DEFAULT_POOL_MAX_SIZE, DEFAULT_WRITER_QUEUE_CAPACITY, MIN_POOL_SIZE,
};
use crate::errors::{Error, Result};

/// Settings used to open the wallet cache database.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    /// Per-user application data directory holding the database file.
    pub app_data_dir: PathBuf,
    pub db_file_name: String,
    pub pool_max_size: u32,
    pub connection_timeout_secs: u64,
    pub busy_timeout_ms: u32,
    /// Bound of the writer actor's job queue.
    pub writer_queue_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            app_data_dir: default_app_data_dir(),
            db_file_name: DEFAULT_DB_FILE_NAME.to_string(),
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            writer_queue_capacity: DEFAULT_WRITER_QUEUE_CAPACITY,
        }
    }
}

impl StorageConfig {
    pub fn new(app_data_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_data_dir: app_data_dir.into(),
            ..Self::default()
        }
    }

    /// Builds a configuration from `WALLETCACHE_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("WALLETCACHE_DATA_DIR") {
            config.app_data_dir = PathBuf::from(dir);
        }
        if let Ok(name) = std::env::var("WALLETCACHE_DB_FILE") {
            config.db_file_name = name;
        }
        if let Some(size) = parse_env::<u32>("WALLETCACHE_POOL_SIZE")? {
            config.pool_max_size = size;
        }
        if let Some(ms) = parse_env::<u32>("WALLETCACHE_BUSY_TIMEOUT_MS")? {
            config.busy_timeout_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_max_size < MIN_POOL_SIZE {
            return Err(Error::InvalidConfigValue(format!(
                "pool_max_size must be at least {} (one connection is reserved for writes)",
                MIN_POOL_SIZE
            )));
        }
        if self.writer_queue_capacity == 0 {
            return Err(Error::InvalidConfigValue(
                "writer_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.db_file_name.trim().is_empty() {
            return Err(Error::InvalidConfigValue(
                "db_file_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of the database file, honouring a `DATABASE_URL` override.
    pub fn db_path(&self) -> PathBuf {
        std::env::var("DATABASE_URL")
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.default_db_path())
    }

    pub fn default_db_path(&self) -> PathBuf {
        Path::new(&self.app_data_dir).join(&self.db_file_name)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }
}

/// `walletcache` under the platform's per-user data directory
/// (e.g. `~/.local/share` on Linux, `~/Library/Application Support` on macOS).
pub fn default_app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::InvalidConfigValue(format!("{}={}", key, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StorageConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.db_file_name, "wallet.sqlite");
        assert_eq!(config.pool_max_size, 8);
    }

    #[test]
    fn test_default_db_path_joins_data_dir() {
        let config = StorageConfig::new("/tmp/wallet-data");
        assert_eq!(
            config.default_db_path(),
            PathBuf::from("/tmp/wallet-data/wallet.sqlite")
        );
    }

    #[test]
    fn test_default_data_dir_is_per_user_app_dir() {
        let config = StorageConfig::default();
        assert!(config.app_data_dir.ends_with("walletcache"));
        assert_eq!(config.app_data_dir, default_app_data_dir());
        if let Some(data_dir) = dirs::data_dir() {
            assert!(config.app_data_dir.starts_with(data_dir));
        }
    }

    #[test]
    fn test_pool_without_a_reader_connection_is_rejected() {
        for size in [0, 1] {
            let config = StorageConfig {
                pool_max_size: size,
                ..StorageConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(Error::InvalidConfigValue(_))
            ));
        }
    }

    #[test]
    fn test_minimum_pool_size_is_accepted() {
        let config = StorageConfig {
            pool_max_size: MIN_POOL_SIZE,
            ..StorageConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial_config_uses_defaults() {
        let config: StorageConfig =
            serde_json::from_str(r#"{"appDataDir": "/data", "poolMaxSize": 2}"#).unwrap();
        assert_eq!(config.app_data_dir, PathBuf::from("/data"));
        assert_eq!(config.pool_max_size, 2);
        assert_eq!(config.busy_timeout_ms, 30_000);
    }
}
