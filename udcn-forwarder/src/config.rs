use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use udcn_core::Name;

use crate::error::ConfigError;
use crate::strategy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Lifetime applied to Interests that carry none
    pub default_interest_lifetime_ms: u64,
    pub straggler_time_ms: u64,
    pub dead_nonce_list: DeadNonceListConfig,
    pub content_store: ContentStoreConfig,
    pub strategy: Vec<StrategyChoiceConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadNonceListConfig {
    pub lifetime_ms: u64,
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentStoreConfig {
    /// 0 disables caching
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyChoiceConfig {
    pub prefix: String,
    pub name: String,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            default_interest_lifetime_ms: 4000,
            straggler_time_ms: 100,
            dead_nonce_list: DeadNonceListConfig::default(),
            content_store: ContentStoreConfig::default(),
            strategy: vec![StrategyChoiceConfig {
                prefix: "/".to_string(),
                name: strategy::MULTICAST.to_string(),
            }],
        }
    }
}

impl Default for DeadNonceListConfig {
    fn default() -> Self {
        Self {
            lifetime_ms: 6000,
            capacity: 65536,
        }
    }
}

impl Default for ContentStoreConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

impl ForwarderConfig {
    /// Load from a TOML file; a missing file yields the defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if !path.as_ref().exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ForwarderConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_interest_lifetime_ms == 0 {
            return Err(ConfigError::Invalid(
                "default_interest_lifetime_ms must be positive".to_string(),
            ));
        }
        if self.dead_nonce_list.lifetime_ms == 0 {
            return Err(ConfigError::Invalid(
                "dead_nonce_list.lifetime_ms must be positive".to_string(),
            ));
        }
        if self.dead_nonce_list.capacity == 0 {
            return Err(ConfigError::Invalid(
                "dead_nonce_list.capacity must be positive".to_string(),
            ));
        }
        for choice in &self.strategy {
            Name::from_str(&choice.prefix).map_err(|e| {
                ConfigError::Invalid(format!("strategy prefix {:?}: {}", choice.prefix, e))
            })?;
            if !strategy::is_known(&choice.name) {
                return Err(ConfigError::Invalid(format!(
                    "unknown strategy {:?} for prefix {}",
                    choice.name, choice.prefix
                )));
            }
        }
        Ok(())
    }

    pub fn default_interest_lifetime(&self) -> Duration {
        Duration::from_millis(self.default_interest_lifetime_ms)
    }

    pub fn straggler_time(&self) -> Duration {
        Duration::from_millis(self.straggler_time_ms)
    }
}

impl DeadNonceListConfig {
    pub fn lifetime(&self) -> Duration {
        Duration::from_millis(self.lifetime_ms)
    }
}
