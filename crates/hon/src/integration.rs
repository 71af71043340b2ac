//! Session lifecycle binding for hOn config entries
//!
//! On setup, one authenticated account session is opened per entry and
//! registered under the integration's domain; the (possibly rotated)
//! refresh token is written back to the entry, and the entry is forwarded
//! to every platform module. On unload the current token is persisted
//! again before the platforms are released, so the next setup can resume
//! the session without a full login.

use std::sync::Arc;

use async_trait::async_trait;
use ha_config::Value;
use ha_config_entries::{
    ConfigEntriesError, ConfigEntry, ConfigEntrySource, HomeAssistant, HookResult, Integration,
};
use tracing::{debug, info, warn};

use crate::client::{HonAccount, HonConfig, HonConnector};
use crate::constants::{CONF_EMAIL, CONF_PASSWORD, CONF_REFRESH_TOKEN, DOMAIN, MOBILE_ID, PLATFORMS};
use crate::error::{HonError, HonResult};
use crate::registry::SessionRegistry;
use crate::schema;

/// Registry type shared between the integration and its platforms
pub type HonRegistry = SessionRegistry<dyn HonAccount>;

/// The hOn integration
pub struct HonIntegration {
    connector: Arc<dyn HonConnector>,
    registry: Arc<HonRegistry>,
}

/// Key under which an entry's session is registered
pub fn instance_id(entry: &ConfigEntry) -> String {
    entry
        .unique_id
        .clone()
        .unwrap_or_else(|| entry.entry_id.clone())
}

impl HonIntegration {
    pub fn new(connector: Arc<dyn HonConnector>) -> Self {
        Self {
            connector,
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    /// Shared session registry, for platform modules
    pub fn registry(&self) -> Arc<HonRegistry> {
        self.registry.clone()
    }

    /// Live session of an entry
    pub fn session(&self, entry: &ConfigEntry) -> Option<Arc<dyn HonAccount>> {
        self.registry.lookup(DOMAIN, &instance_id(entry))
    }

    /// Open the account session for an entry and forward it to the platforms
    pub async fn setup_entry(
        &self,
        hass: &Arc<HomeAssistant>,
        entry: &ConfigEntry,
    ) -> HonResult<bool> {
        let config_dir = hass
            .config
            .config_dir
            .clone()
            .ok_or(HonError::MissingConfigDir)?;

        let email = entry
            .data_str(CONF_EMAIL)
            .ok_or(HonError::MissingData(CONF_EMAIL))?;
        let password = entry
            .data_str(CONF_PASSWORD)
            .ok_or(HonError::MissingData(CONF_PASSWORD))?;
        let refresh_token = entry
            .data_str(CONF_REFRESH_TOKEN)
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        let config = HonConfig {
            email: email.to_string(),
            password: password.to_string(),
            mobile_id: MOBILE_ID.to_string(),
            session: hass.client_session(),
            test_data_path: config_dir,
            refresh_token,
        };
        debug!("Opening hOn session: {:?}", config);

        let hon = self.connector.create(config).await.map_err(HonError::Client)?;

        let instance_id = instance_id(entry);
        if self
            .registry
            .register(DOMAIN, &instance_id, hon.clone())
            .is_some()
        {
            warn!("Replaced a live hOn session for {}", instance_id);
        }

        // Capture a token rotated during authentication
        if let Err(e) = persist_refresh_token(hass, entry, hon.refresh_token()).await {
            self.registry.unregister(DOMAIN, &instance_id);
            return Err(e);
        }

        hass.config_entries
            .schedule_forward_setups(hass, entry, PLATFORMS)
            .await;

        info!("hOn account {} set up", instance_id);
        Ok(true)
    }

    /// Persist the current token, release the platforms and drop the session
    pub async fn unload_entry(
        &self,
        hass: &Arc<HomeAssistant>,
        entry: &ConfigEntry,
    ) -> HonResult<bool> {
        let instance_id = instance_id(entry);
        let hon = self
            .registry
            .lookup(DOMAIN, &instance_id)
            .ok_or_else(|| HonError::SessionNotFound {
                instance_id: instance_id.clone(),
            })?;

        persist_refresh_token(hass, entry, hon.refresh_token()).await?;

        let unloaded = hass
            .config_entries
            .unload_platforms(hass, entry, PLATFORMS)
            .await?;
        if unloaded {
            if self.registry.unregister(DOMAIN, &instance_id) {
                debug!("Last hOn account unloaded, dropping shared state");
            }
            info!("hOn account {} unloaded", instance_id);
        } else {
            warn!("Platforms of hOn account {} did not unload", instance_id);
        }
        Ok(unloaded)
    }

    /// Create config entries for accounts listed in `configuration.yaml`.
    ///
    /// Accounts that already have an entry are left alone.
    pub async fn import_yaml(&self, hass: &Arc<HomeAssistant>, section: &Value) -> HonResult<usize> {
        let mut imported = 0;
        for account in schema::validate_section(section)? {
            if hass
                .config_entries
                .get_by_unique_id(DOMAIN, &account.email)
                .is_some()
            {
                debug!("hOn account {} already configured", account.email);
                continue;
            }

            let entry = ConfigEntry::new(DOMAIN, account.email.clone())
                .with_unique_id(account.email.clone())
                .with_source(ConfigEntrySource::Import)
                .with_data_value(CONF_EMAIL, account.email)
                .with_data_value(CONF_PASSWORD, account.password);
            match hass.config_entries.add(entry).await {
                Ok(_) => imported += 1,
                // raced with another import of the same account
                Err(ConfigEntriesError::AlreadyExists { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(imported)
    }
}

/// Overwrite the entry's cached refresh token with the session's current one
async fn persist_refresh_token(
    hass: &Arc<HomeAssistant>,
    entry: &ConfigEntry,
    refresh_token: String,
) -> HonResult<()> {
    let mut data = hass
        .config_entries
        .get(&entry.entry_id)
        .map(|current| current.data)
        .unwrap_or_else(|| entry.data.clone());
    data.insert(CONF_REFRESH_TOKEN.to_string(), refresh_token.into());

    hass.config_entries
        .update_entry(&entry.entry_id, data)
        .await?;
    Ok(())
}

#[async_trait]
impl Integration for HonIntegration {
    fn domain(&self) -> &str {
        DOMAIN
    }

    async fn async_setup(&self, hass: &Arc<HomeAssistant>, config: &Value) -> HookResult {
        let imported = self
            .import_yaml(hass, config)
            .await
            .map_err(HonError::into_box_error)?;
        if imported > 0 {
            info!("Imported {} hOn account(s) from YAML", imported);
        }
        Ok(true)
    }

    async fn async_setup_entry(&self, hass: &Arc<HomeAssistant>, entry: &ConfigEntry) -> HookResult {
        self.setup_entry(hass, entry)
            .await
            .map_err(HonError::into_box_error)
    }

    async fn async_unload_entry(
        &self,
        hass: &Arc<HomeAssistant>,
        entry: &ConfigEntry,
    ) -> HookResult {
        self.unload_entry(hass, entry)
            .await
            .map_err(HonError::into_box_error)
    }
}
