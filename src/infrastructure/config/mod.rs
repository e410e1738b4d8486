//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::application::errors::ConfigError;
use crate::domain::traits::Store;
use crate::infrastructure::logging::Diagnostics;
use crate::infrastructure::storage::{CacheConfig, CombinedStore, JsonStore};

/// Storage service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub storage: StorageConfig,
    pub cache: CacheSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Durable JSON documents only
    Json,
    /// Cache layer over the JSON documents
    Combined,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub backend: Backend,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheSection {
    pub max_capacity: u64,
    pub time_to_idle_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                data_dir: PathBuf::from("./data"),
                backend: Backend::Combined,
            },
            cache: CacheSection {
                max_capacity: 10_000,
                time_to_idle_secs: Some(600),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load_env() -> Self {
        // Load from environment variables
        let mut config = Config::default();

        if let Ok(dir) = std::env::var("HAWK_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }

        if let Ok(capacity) = std::env::var("HAWK_CACHE_CAPACITY") {
            match capacity.parse() {
                Ok(value) => config.cache.max_capacity = value,
                Err(_) => tracing::warn!("Ignoring invalid HAWK_CACHE_CAPACITY: {}", capacity),
            }
        }

        if let Ok(backend) = std::env::var("HAWK_BACKEND") {
            match backend.as_str() {
                "json" => config.storage.backend = Backend::Json,
                "combined" => config.storage.backend = Backend::Combined,
                other => tracing::warn!("Ignoring unknown HAWK_BACKEND: {}", other),
            }
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("storage.data-dir".to_string()));
        }
        if self.cache.max_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "cache.max-capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_capacity: self.cache.max_capacity,
            time_to_idle: self.cache.time_to_idle_secs.map(Duration::from_secs),
        }
    }

    /// Assemble the configured store. The caller still has to `open` it.
    pub fn build_store(&self, diagnostics: Diagnostics) -> Arc<dyn Store> {
        let durable: Arc<dyn Store> = Arc::new(JsonStore::new(&self.storage.data_dir, diagnostics.clone()));
        match self.storage.backend {
            Backend::Json => durable,
            Backend::Combined => Arc::new(CombinedStore::new(durable, &self.cache_config(), diagnostics)),
        }
    }
}
