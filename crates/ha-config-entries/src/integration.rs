//! Integration and platform hooks
//!
//! An [`Integration`] owns a domain's config entries; an [`EntryPlatform`]
//! is a per-entity-type module (sensor, switch, ...) the integration
//! forwards its entries to.

use async_trait::async_trait;
use std::sync::Arc;

use crate::entry::ConfigEntry;
use crate::hass::HomeAssistant;

/// Error type returned by integration and platform hooks.
///
/// Integrations surface their own errors through this unchanged.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of a lifecycle hook, `Ok(false)` is a non-exceptional failure
pub type HookResult = Result<bool, BoxError>;

/// Lifecycle hooks for an integration domain
#[async_trait]
pub trait Integration: Send + Sync {
    /// Domain this integration handles (e.g., "hon")
    fn domain(&self) -> &str;

    /// Set up the domain from its `configuration.yaml` section
    async fn async_setup(&self, _hass: &Arc<HomeAssistant>, _config: &ha_config::Value) -> HookResult {
        Ok(true)
    }

    /// Set up one config entry
    async fn async_setup_entry(&self, hass: &Arc<HomeAssistant>, entry: &ConfigEntry) -> HookResult;

    /// Unload one config entry
    async fn async_unload_entry(&self, hass: &Arc<HomeAssistant>, entry: &ConfigEntry)
        -> HookResult;
}

/// A platform module an integration forwards its entries to
#[async_trait]
pub trait EntryPlatform: Send + Sync {
    async fn async_setup_entry(&self, hass: &Arc<HomeAssistant>, entry: &ConfigEntry) -> HookResult;

    async fn async_unload_entry(
        &self,
        _hass: &Arc<HomeAssistant>,
        _entry: &ConfigEntry,
    ) -> HookResult {
        Ok(true)
    }
}
