//! YAML configuration for the Home Assistant host
//!
//! Loads `configuration.yaml` from a config directory, substituting
//! `!secret` and `!env_var` tags, and exposes:
//!
//! - [`CoreConfig`] - the `homeassistant:` section plus the resolved config directory
//! - [`integration_section`] - the raw section for an integration domain
//!
//! # Example
//!
//! ```ignore
//! use ha_config::{load_yaml, CoreConfig};
//!
//! let yaml = load_yaml("/config", "configuration.yaml")?;
//! let core = CoreConfig::from_yaml(&yaml)?.with_config_dir("/config");
//! let hon = ha_config::integration_section(&yaml, "hon");
//! ```

mod core_config;
mod error;
mod loader;
mod secrets;

pub use core_config::{integration_section, CoreConfig, CONFIG_FILE};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, YamlLoader};
pub use secrets::Secrets;

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
