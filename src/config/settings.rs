use crate::error::{Error, Result};
use crate::records::validation::{self, Limits};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_history_capacity: u8,
    /// Window size for users who never set one
    pub default_history_capacity: u8,
    pub max_message_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());
        Self::from_sources(&format!("config/{}", config_env))
    }

    /// Built-in defaults, then the optional file `file_stem`, then `APP__*` variables.
    pub fn from_sources(file_stem: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("storage.data_root", "data")?
            .set_default("limits.max_history_capacity", 100)?
            .set_default("limits.default_history_capacity", 5)?
            .set_default("limits.max_message_length", 4000)?
            .set_default("logging.level", "info")?
            .add_source(File::with_name(file_stem).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Bounds for the validation gate, checked against their hard ceilings
    pub fn limits(&self) -> Result<Limits> {
        Limits::new(
            self.limits.max_history_capacity,
            self.limits.max_message_length,
        )
    }

    /// Capacity used when a user has no `modify-capacity` option
    pub fn default_capacity(&self) -> Result<u8> {
        let limits = self.limits()?;
        validation::capacity(i64::from(self.limits.default_history_capacity), &limits).map_err(
            |_| {
                Error::invalid(
                    "default_history_capacity",
                    format!(
                        "{} is outside 1..={}",
                        self.limits.default_history_capacity,
                        limits.max_history_capacity()
                    ),
                )
            },
        )
    }
}
