//! The host hub handed to integrations
//!
//! Bundles the core configuration, the config entries manager, the
//! shared HTTP client session and the background task set.

use std::future::{poll_fn, Future};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use ha_config::{CoreConfig, Value};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::entry::ConfigEntryState;
use crate::manager::{ConfigEntries, ConfigEntriesError, ConfigEntriesResult};
use crate::storage::Storage;

/// The central Home Assistant instance as seen by integrations
pub struct HomeAssistant {
    /// Core configuration, including the config directory
    pub config: CoreConfig,
    /// Config entries and their lifecycle
    pub config_entries: ConfigEntries,
    /// Shared HTTP session, created on first use
    client_session: OnceLock<reqwest::Client>,
    /// Tasks created through [`HomeAssistant::create_task`]
    tasks: Mutex<JoinSet<()>>,
}

impl HomeAssistant {
    /// Create a hub; entries persist under the config directory if there is one
    pub fn new(config: CoreConfig) -> Arc<Self> {
        let storage = config.config_dir.as_ref().map(|dir| Storage::new(dir));
        Arc::new(Self {
            config,
            config_entries: ConfigEntries::new(storage),
            client_session: OnceLock::new(),
            tasks: Mutex::new(JoinSet::new()),
        })
    }

    /// Create a hub and load persisted config entries
    pub async fn load(config: CoreConfig) -> ConfigEntriesResult<Arc<Self>> {
        let hass = Self::new(config);
        hass.config_entries.load().await?;
        Ok(hass)
    }

    /// The shared HTTP client session.
    ///
    /// The hub owns it; integrations clone the handle and never close it.
    pub fn client_session(&self) -> reqwest::Client {
        self.client_session
            .get_or_init(|| {
                debug!("Creating shared client session");
                reqwest::Client::new()
            })
            .clone()
    }

    /// Schedule a background task owned by the hub
    pub fn create_task<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks();
        // reap finished tasks so the set doesn't grow without bound
        while tasks.try_join_next().is_some() {}
        tasks.spawn(future);
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until every scheduled task, including ones scheduled meanwhile, has finished.
    ///
    /// Tasks stay in the hub's set while waiting, so dropping this future
    /// leaves them running.
    pub async fn block_till_done(&self) {
        while let Some(result) = poll_fn(|cx| self.tasks().poll_join_next(cx)).await {
            if let Err(e) = result {
                warn!("Background task failed: {}", e);
            }
        }
    }

    /// Set up an integration domain: run its YAML hook, then set up its entries.
    ///
    /// Entry failures are logged and leave the entry in its failed state;
    /// they do not fail the component.
    pub async fn setup_component(
        self: &Arc<Self>,
        domain: &str,
        yaml: &Value,
    ) -> ConfigEntriesResult<bool> {
        let integration = self
            .config_entries
            .integration(domain)
            .ok_or_else(|| ConfigEntriesError::NoIntegration(domain.to_string()))?;

        let section = ha_config::integration_section(yaml, domain)
            .cloned()
            .unwrap_or(Value::Null);
        match integration.async_setup(self, &section).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Setup of component {} returned false", domain);
                return Ok(false);
            }
            Err(e) => {
                warn!("Setup of component {} failed: {}", domain, e);
                return Ok(false);
            }
        }

        for entry in self.config_entries.get_by_domain(domain) {
            if entry.state != ConfigEntryState::NotLoaded {
                continue;
            }
            if let Err(e) = self.config_entries.setup(self, &entry.entry_id).await {
                warn!("Error setting up entry {} for {}: {}", entry.title, domain, e);
            }
        }

        info!("Setup of component {} done", domain);
        Ok(true)
    }
}
