//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::cache::CacheMode;

/// Federation layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationConfig {
    pub cache: CacheConfig,
    pub fallback: FallbackConfig,
    pub connector: ConnectorConfig,
    pub limiter: LimiterConfig,
}

/// Record cache policy: per context, per source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// context -> source -> mode
    pub contexts: HashMap<String, HashMap<String, CacheMode>>,
}

/// Fallback loader wiring, per source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// source -> where its fallback loader searches
    pub sources: HashMap<String, FallbackSource>,
}

/// One source's fallback loader target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackSource {
    /// Backend the fallback query runs against
    pub backend: String,
    /// Field queried with the requested id
    pub id_field: String,
}

/// Solr-style connector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub base_url: String,
    pub core: String,
    pub timeout_secs: u64,
    pub unique_key: String,
}

/// Rate limiter storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Prefix for derived storage keys; may be empty
    pub namespace: String,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            fallback: FallbackConfig::default(),
            connector: ConnectorConfig {
                base_url: "http://localhost:8983/solr".to_string(),
                core: "biblio".to_string(),
                timeout_secs: 30,
                unique_key: "id".to_string(),
            },
            limiter: LimiterConfig {
                namespace: "fedsearch".to_string(),
            },
        }
    }
}

impl FederationConfig {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("FEDSEARCH_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("fedsearch")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: FederationConfig = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            // Return default config without creating file
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.connector.base_url.is_empty() {
            return Err(anyhow!("connector.base_url must not be empty"));
        }
        if self.connector.timeout_secs == 0 {
            return Err(anyhow!("connector.timeout_secs must be positive"));
        }
        for (context, sources) in &self.cache.contexts {
            if context.is_empty() {
                return Err(anyhow!("cache context names must not be empty"));
            }
            if sources.keys().any(|s| s.is_empty()) {
                return Err(anyhow!(
                    "cache context '{}' contains an empty source name",
                    context
                ));
            }
        }
        for (source, target) in &self.fallback.sources {
            if target.backend.is_empty() || target.id_field.is_empty() {
                return Err(anyhow!(
                    "fallback wiring for source '{}' must name a backend and an id field",
                    source
                ));
            }
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "connector.base_url" => Ok(self.connector.base_url.clone()),
            "connector.core" => Ok(self.connector.core.clone()),
            "connector.timeout_secs" => Ok(self.connector.timeout_secs.to_string()),
            "connector.unique_key" => Ok(self.connector.unique_key.clone()),
            "limiter.namespace" => Ok(self.limiter.namespace.clone()),
            _ => Err(anyhow!(
                "Unknown configuration key: {}. Known keys: {}",
                key,
                Self::keys().join(", ")
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "connector.base_url" => {
                if value.is_empty() {
                    return Err(anyhow!("connector.base_url must not be empty"));
                }
                self.connector.base_url = value.to_string();
            }
            "connector.core" => {
                self.connector.core = value.to_string();
            }
            "connector.timeout_secs" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
                if secs == 0 {
                    return Err(anyhow!("connector.timeout_secs must be positive"));
                }
                self.connector.timeout_secs = secs;
            }
            "connector.unique_key" => {
                self.connector.unique_key = value.to_string();
            }
            "limiter.namespace" => {
                self.limiter.namespace = value.to_string();
            }
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Known keys: {}",
                    key,
                    Self::keys().join(", ")
                ));
            }
        }
        Ok(())
    }

    /// All settable key paths
    pub fn keys() -> Vec<&'static str> {
        vec![
            "connector.base_url",
            "connector.core",
            "connector.timeout_secs",
            "connector.unique_key",
            "limiter.namespace",
        ]
    }

    /// List every settable key with its current value
    pub fn list(&self) -> Vec<(String, String)> {
        Self::keys()
            .into_iter()
            .filter_map(|key| self.get(key).ok().map(|value| (key.to_string(), value)))
            .collect()
    }
}
