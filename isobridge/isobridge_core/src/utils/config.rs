//! Configuration for the bridge.
//!
//! Configuration is read from a TOML file whose path is given by the
//! `ISOBRIDGE_CONFIG` environment variable. Every field has a default, so an
//! absent variable or a partial file is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{ConfigError, Result};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "ISOBRIDGE_CONFIG";

/// Background teardown configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownConfig {
    /// Number of teardown worker threads
    #[serde(default = "default_teardown_workers")]
    pub workers: usize,

    /// Maximum number of queued teardown jobs
    #[serde(default = "default_teardown_queue_size")]
    pub queue_size: usize,
}

fn default_teardown_workers() -> usize {
    1
}

fn default_teardown_queue_size() -> usize {
    64
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            workers: default_teardown_workers(),
            queue_size: default_teardown_queue_size(),
        }
    }
}

/// Cross-domain redirection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectConfig {
    /// Maximum number of nested redirection hops on one thread
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

fn default_max_depth() -> u32 {
    1
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// The base log level, overridden by `ISOBRIDGE_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to emit JSON lines instead of plain text
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Image loaded into the root domain and into every new isolated domain
    #[serde(default = "default_component_image")]
    pub component_image: PathBuf,

    /// Type name under which the component publishes its exports
    #[serde(default = "default_component_type")]
    pub component_type: String,

    /// Background teardown settings
    #[serde(default)]
    pub teardown: TeardownConfig,

    /// Redirection settings
    #[serde(default)]
    pub redirect: RedirectConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_component_image() -> PathBuf {
    PathBuf::from("isobridge_component")
}

fn default_component_type() -> String {
    "isobridge::exports".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            component_image: default_component_image(),
            component_type: default_component_type(),
            teardown: TeardownConfig::default(),
            redirect: RedirectConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: BridgeConfig =
            toml::from_str(text).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::LoadFailed(format!("{}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load the configuration named by `ISOBRIDGE_CONFIG`, or the defaults
    /// when the variable is unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load(PathBuf::from(path)),
            _ => {
                warn!("{} not set, using default configuration", CONFIG_ENV);
                Ok(Self::default())
            }
        }
    }

    /// Check the configuration for values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.teardown.workers == 0 {
            return Err(ConfigError::Invalid("teardown.workers must be at least 1".into()).into());
        }
        if self.teardown.queue_size == 0 {
            return Err(
                ConfigError::Invalid("teardown.queue_size must be at least 1".into()).into(),
            );
        }
        if self.redirect.max_depth == 0 {
            return Err(
                ConfigError::Invalid("redirect.max_depth must be at least 1".into()).into(),
            );
        }
        if self.component_type.is_empty() {
            return Err(ConfigError::Invalid("component_type must not be empty".into()).into());
        }
        Ok(())
    }

    /// Serialize the configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| crate::error::Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.redirect.max_depth, 1);
        assert_eq!(config.teardown.workers, 1);
        assert_eq!(config.component_type, "isobridge::exports");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = BridgeConfig::from_toml_str(
            r#"
            component_image = "/opt/bridge/component.bin"

            [teardown]
            workers = 2

            [logging]
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.component_image, PathBuf::from("/opt/bridge/component.bin"));
        assert_eq!(config.teardown.workers, 2);
        assert_eq!(config.teardown.queue_size, 64);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = BridgeConfig::from_toml_str("[redirect]\nmax_depth = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_depth"));

        let err = BridgeConfig::from_toml_str("[teardown]\nworkers = 0\n").unwrap_err();
        assert!(err.to_string().contains("workers"));

        assert!(BridgeConfig::from_toml_str("component_type = 3").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "component_type = \"demo::exports\"").unwrap();

        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.component_type, "demo::exports");

        let text = config.to_toml_string().unwrap();
        assert_eq!(BridgeConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let err = BridgeConfig::load("/nonexistent/isobridge.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to load configuration"));
    }
}
