//! hOn appliance account integration
//!
//! Binds the lifecycle of hOn cloud account sessions to config entries:
//!
//! - [`HonIntegration`] - setup/unload hooks and YAML import
//! - [`HonConnector`] / [`HonAccount`] - the contract with the remote client library
//! - [`SessionRegistry`] - live sessions and platform coordinators, keyed by domain
//! - [`schema`] - validation of the `hon:` section of `configuration.yaml`
//!
//! # Example
//!
//! ```ignore
//! let hass = HomeAssistant::load(CoreConfig::load("/config")?).await?;
//! let hon = Arc::new(HonIntegration::new(Arc::new(MyConnector::default())));
//! hass.config_entries.register_integration(hon.clone());
//! hass.setup_component(hon::DOMAIN, &yaml).await?;
//! ```

mod client;
mod constants;
mod error;
mod integration;
mod registry;
pub mod schema;

pub use client::{HonAccount, HonConfig, HonConnector};
pub use constants::{
    CONF_EMAIL, CONF_PASSWORD, CONF_REFRESH_TOKEN, DOMAIN, MOBILE_ID, PLATFORMS,
};
pub use error::{HonError, HonResult};
pub use integration::{instance_id, HonIntegration, HonRegistry};
pub use registry::{Coordinator, SessionRegistry};
