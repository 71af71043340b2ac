//! Core Home Assistant configuration
//!
//! Parses the `homeassistant:` section from configuration.yaml and
//! carries the config directory the host was started with.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;

/// Name of the main configuration file
pub const CONFIG_FILE: &str = "configuration.yaml";

/// Core configuration from the `homeassistant:` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Name of the location (e.g., "Home")
    #[serde(default = "default_name")]
    pub name: String,

    /// Time zone (e.g., "Europe/Rome")
    #[serde(default = "default_time_zone")]
    pub time_zone: String,

    /// Language code (e.g., "en")
    #[serde(default = "default_language")]
    pub language: String,

    /// Directory holding configuration.yaml and `.storage/`.
    ///
    /// Not read from YAML; `None` when the host runs without one.
    #[serde(skip)]
    pub config_dir: Option<PathBuf>,
}

fn default_name() -> String {
    "Home".to_string()
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            time_zone: default_time_zone(),
            language: default_language(),
            config_dir: None,
        }
    }
}

impl CoreConfig {
    /// Load core configuration from a config directory
    pub fn load(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let config_dir = config_dir.as_ref();
        let yaml = load_yaml(config_dir, CONFIG_FILE)?;
        Ok(Self::from_yaml(&yaml)?.with_config_dir(config_dir))
    }

    /// Parse core configuration from a YAML document
    pub fn from_yaml(yaml: &Value) -> ConfigResult<Self> {
        if !yaml.is_mapping() {
            return Err(ConfigError::InvalidValue {
                key: "root".to_string(),
                reason: "configuration must be a mapping".to_string(),
            });
        }

        let Some(section) = integration_section(yaml, "homeassistant") else {
            return Ok(Self::default());
        };

        serde_yaml::from_value(section.clone()).map_err(|e| ConfigError::InvalidValue {
            key: "homeassistant".to_string(),
            reason: e.to_string(),
        })
    }

    /// Set the config directory
    pub fn with_config_dir(mut self, config_dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(config_dir.into());
        self
    }
}

/// Get the top-level section for a domain, if configured
pub fn integration_section<'a>(yaml: &'a Value, domain: &str) -> Option<&'a Value> {
    yaml.as_mapping()?.get(domain).filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();
        assert_eq!(config.name, "Home");
        assert_eq!(config.time_zone, "UTC");
        assert!(config.config_dir.is_none());
    }

    #[test]
    fn test_parse_from_yaml() {
        let yaml: Value = serde_yaml::from_str(
            r#"
homeassistant:
  name: Test Home
  time_zone: Europe/Rome
hon:
  email: user@example.com
"#,
        )
        .unwrap();

        let config = CoreConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.name, "Test Home");
        assert_eq!(config.time_zone, "Europe/Rome");
        assert_eq!(config.language, "en");
    }

    #[test]
    fn test_non_mapping_rejected() {
        let yaml: Value = serde_yaml::from_str("- a\n- b\n").unwrap();
        assert!(matches!(
            CoreConfig::from_yaml(&yaml),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_load_sets_config_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "homeassistant:\n  name: Flat\n").unwrap();

        let config = CoreConfig::load(dir.path()).unwrap();
        assert_eq!(config.name, "Flat");
        assert_eq!(config.config_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_integration_section() {
        let yaml: Value = serde_yaml::from_str("hon:\n  email: x\nempty:\n").unwrap();
        assert!(integration_section(&yaml, "hon").is_some());
        assert!(integration_section(&yaml, "empty").is_none());
        assert!(integration_section(&yaml, "missing").is_none());
    }
}
