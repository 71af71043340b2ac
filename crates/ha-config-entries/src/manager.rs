//! Config Entries Manager
//!
//! Stores config entries, drives their setup/unload through the owning
//! [`Integration`], and forwards entries to [`EntryPlatform`]s.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryState, ConfigEntryUpdate};
use crate::hass::HomeAssistant;
use crate::integration::{BoxError, EntryPlatform, Integration};
use crate::state_machine::InvalidTransition;
use crate::storage::{Storage, StorageError, StorageFile};

/// Storage key for config entries
pub const STORAGE_KEY: &str = "core.config_entries";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 5;

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("no integration registered for domain {0}")]
    NoIntegration(String),

    #[error("platform {domain}.{platform} not found")]
    PlatformNotFound { domain: String, platform: String },

    #[error("setup failed for entry {entry_id}: {reason}")]
    SetupFailed {
        entry_id: String,
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("unload failed for entry {entry_id}")]
    UnloadFailed {
        entry_id: String,
        #[source]
        source: BoxError,
    },

    #[error("platform {domain}.{platform} failed for entry {entry_id}")]
    PlatformFailed {
        domain: String,
        platform: String,
        entry_id: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Config entries data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigEntriesData {
    pub entries: Vec<ConfigEntry>,
}

/// Config Entries Manager
pub struct ConfigEntries {
    /// Storage backend, `None` keeps entries in memory only
    storage: Option<Storage>,

    /// Serializes writes so the newest snapshot always lands last
    save_lock: Mutex<()>,

    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Index: (domain, unique_id) -> entry_id
    by_unique_id: DashMap<(String, String), String>,

    integrations: DashMap<String, Arc<dyn Integration>>,

    /// (domain, platform) -> platform module
    platforms: DashMap<(String, String), Arc<dyn EntryPlatform>>,

    /// entry_id -> platforms currently set up for it
    loaded_platforms: DashMap<String, HashSet<String>>,

    /// entry_id -> gate held shared by each scheduled platform setup
    /// until it finishes, and exclusively while platforms unload
    forward_gates: DashMap<String, Arc<RwLock<()>>>,
}

impl ConfigEntries {
    /// Create a new config entries manager
    pub fn new(storage: Option<Storage>) -> Self {
        Self {
            storage,
            save_lock: Mutex::new(()),
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            by_unique_id: DashMap::new(),
            integrations: DashMap::new(),
            platforms: DashMap::new(),
            loaded_platforms: DashMap::new(),
            forward_gates: DashMap::new(),
        }
    }

    /// Load entries from storage
    pub async fn load(&self) -> ConfigEntriesResult<()> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };

        if let Some(file) = storage
            .load::<ConfigEntriesData>(STORAGE_KEY, STORAGE_VERSION)
            .await?
        {
            info!(
                "Loading {} config entries from storage (v{}.{})",
                file.data.entries.len(),
                file.version,
                file.minor_version
            );
            for entry in file.data.entries {
                self.index_entry(entry);
            }
        }
        Ok(())
    }

    /// Save entries to storage
    pub async fn save(&self) -> ConfigEntriesResult<()> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        let _guard = self.save_lock.lock().await;

        let file = StorageFile {
            version: STORAGE_VERSION,
            minor_version: STORAGE_MINOR_VERSION,
            key: STORAGE_KEY.to_string(),
            data: ConfigEntriesData {
                entries: self.iter().collect(),
            },
        };
        storage.save(&file).await?;
        debug!("Saved {} config entries to storage", self.entries.len());
        Ok(())
    }

    fn index_entry(&self, entry: ConfigEntry) {
        let entry_id = entry.entry_id.clone();

        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry_id.clone());

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .insert((entry.domain.clone(), unique_id.clone()), entry_id.clone());
        }

        self.entries.insert(entry_id, entry);
    }

    fn unindex_entry(&self, entry: &ConfigEntry) {
        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(&entry.entry_id);
        }
        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }
        self.entries.remove(&entry.entry_id);
        self.loaded_platforms.remove(&entry.entry_id);
        self.forward_gates.remove(&entry.entry_id);
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    fn require(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        self.get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))
    }

    /// Get all entries for a domain
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        self.by_domain
            .get(domain)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Get entry by unique_id
    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        let entry_id = self
            .by_unique_id
            .get(&(domain.to_string(), unique_id.to_string()))?
            .value()
            .clone();
        self.get(&entry_id)
    }

    /// Add a new config entry
    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(ref unique_id) = entry.unique_id {
            if self.get_by_unique_id(&entry.domain, unique_id).is_some() {
                return Err(ConfigEntriesError::AlreadyExists {
                    domain: entry.domain.clone(),
                    unique_id: unique_id.clone(),
                });
            }
        }

        self.index_entry(entry.clone());
        self.save().await?;

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );
        Ok(entry)
    }

    /// Update an existing entry in place and persist it
    pub async fn update(
        &self,
        entry_id: &str,
        update: ConfigEntryUpdate,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let updated = {
            let mut entry = self
                .entries
                .get_mut(entry_id)
                .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

            if let Some(title) = update.title {
                entry.title = title;
            }
            if let Some(data) = update.data {
                entry.data = data;
            }
            if let Some(options) = update.options {
                entry.options = options;
            }
            if let Some(unique_id) = update.unique_id {
                if let Some(ref old) = entry.unique_id {
                    self.by_unique_id.remove(&(entry.domain.clone(), old.clone()));
                }
                if let Some(ref new) = unique_id {
                    self.by_unique_id
                        .insert((entry.domain.clone(), new.clone()), entry_id.to_string());
                }
                entry.unique_id = unique_id;
            }
            entry.modified_at = Utc::now();
            entry.clone()
        };

        self.save().await?;
        debug!("Updated config entry: {}", entry_id);
        Ok(updated)
    }

    /// Replace an entry's data
    pub async fn update_entry(
        &self,
        entry_id: &str,
        data: HashMap<String, Value>,
    ) -> ConfigEntriesResult<ConfigEntry> {
        self.update(entry_id, ConfigEntryUpdate::new().data(data))
            .await
    }

    /// Remove an entry
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self.require(entry_id)?;
        self.unindex_entry(&entry);
        self.save().await?;

        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );
        Ok(entry)
    }

    fn transition(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(entry.clone())
    }

    /// Register the integration handling a domain
    pub fn register_integration(&self, integration: Arc<dyn Integration>) {
        let domain = integration.domain().to_string();
        debug!("Registered integration: {}", domain);
        self.integrations.insert(domain, integration);
    }

    pub fn integration(&self, domain: &str) -> Option<Arc<dyn Integration>> {
        self.integrations.get(domain).map(|r| r.value().clone())
    }

    /// Register a platform module an integration can forward entries to
    pub fn register_platform(
        &self,
        domain: &str,
        platform: &str,
        handler: Arc<dyn EntryPlatform>,
    ) {
        self.platforms
            .insert((domain.to_string(), platform.to_string()), handler);
        debug!("Registered platform {}.{}", domain, platform);
    }

    /// Set up an entry through its integration.
    ///
    /// A hook error leaves the entry in `SetupRetry` and is returned as
    /// the source of [`ConfigEntriesError::SetupFailed`].
    pub async fn setup(&self, hass: &Arc<HomeAssistant>, entry_id: &str) -> ConfigEntriesResult<()> {
        let lock = self.require(entry_id)?.setup_lock;
        let _guard = lock.lock().await;

        let entry = self.require(entry_id)?;
        if entry.is_disabled() {
            debug!("Skipping setup for disabled entry: {}", entry_id);
            return Ok(());
        }

        let integration = self
            .integration(&entry.domain)
            .ok_or_else(|| ConfigEntriesError::NoIntegration(entry.domain.clone()))?;

        let entry = self.transition(entry_id, ConfigEntryState::SetupInProgress, None)?;

        match integration.async_setup_entry(hass, &entry).await {
            Ok(true) => {
                self.transition(entry_id, ConfigEntryState::Loaded, None)?;
                info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                Ok(())
            }
            Ok(false) => {
                let reason = "integration setup returned false".to_string();
                warn!("Setup failed for entry {}: {}", entry_id, reason);
                self.transition(entry_id, ConfigEntryState::SetupError, Some(reason.clone()))?;
                Err(ConfigEntriesError::SetupFailed {
                    entry_id: entry_id.to_string(),
                    reason,
                    source: None,
                })
            }
            Err(source) => {
                let reason = source.to_string();
                warn!(
                    "Setup of entry {} failed, integration unavailable: {}",
                    entry_id, reason
                );
                self.transition(entry_id, ConfigEntryState::SetupRetry, Some(reason.clone()))?;
                if let Some(mut entry) = self.entries.get_mut(entry_id) {
                    entry.tries += 1;
                }
                Err(ConfigEntriesError::SetupFailed {
                    entry_id: entry_id.to_string(),
                    reason,
                    source: Some(source),
                })
            }
        }
    }

    /// Unload an entry, returning the integration's verdict
    pub async fn unload(
        &self,
        hass: &Arc<HomeAssistant>,
        entry_id: &str,
    ) -> ConfigEntriesResult<bool> {
        let lock = self.require(entry_id)?.setup_lock;
        let _guard = lock.lock().await;

        let entry = self.require(entry_id)?;
        match entry.state {
            ConfigEntryState::NotLoaded => return Ok(true),
            ConfigEntryState::SetupError | ConfigEntryState::SetupRetry => {
                // Setup never completed, nothing to tear down
                self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;
                self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
                return Ok(true);
            }
            ConfigEntryState::Loaded => {}
            other => return Err(ConfigEntriesError::CannotUnload(other)),
        }

        let integration = self
            .integration(&entry.domain)
            .ok_or_else(|| ConfigEntriesError::NoIntegration(entry.domain.clone()))?;

        let entry = self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        match integration.async_unload_entry(hass, &entry).await {
            Ok(true) => {
                self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
                info!("Unloaded entry: {} ({})", entry.title, entry_id);
                Ok(true)
            }
            Ok(false) => {
                warn!("Integration refused to unload entry {}", entry_id);
                self.transition(
                    entry_id,
                    ConfigEntryState::FailedUnload,
                    Some("integration unload returned false".to_string()),
                )?;
                Ok(false)
            }
            Err(source) => {
                warn!("Unload of entry {} failed: {}", entry_id, source);
                self.transition(
                    entry_id,
                    ConfigEntryState::FailedUnload,
                    Some(source.to_string()),
                )?;
                Err(ConfigEntriesError::UnloadFailed {
                    entry_id: entry_id.to_string(),
                    source,
                })
            }
        }
    }

    /// Set up one platform for an entry
    pub async fn forward_entry_setup(
        &self,
        hass: &Arc<HomeAssistant>,
        entry: &ConfigEntry,
        platform: &str,
    ) -> ConfigEntriesResult<bool> {
        let handler = self.platform(&entry.domain, platform)?;

        let loaded = handler
            .async_setup_entry(hass, entry)
            .await
            .map_err(|source| ConfigEntriesError::PlatformFailed {
                domain: entry.domain.clone(),
                platform: platform.to_string(),
                entry_id: entry.entry_id.clone(),
                source,
            })?;

        if loaded {
            self.loaded_platforms
                .entry(entry.entry_id.clone())
                .or_default()
                .insert(platform.to_string());
        }
        debug!(
            "Forwarded entry {} to {}.{}: {}",
            entry.entry_id, entry.domain, platform, loaded
        );
        Ok(loaded)
    }

    fn forward_gate(&self, entry_id: &str) -> Arc<RwLock<()>> {
        self.forward_gates
            .entry(entry_id.to_string())
            .or_default()
            .clone()
    }

    /// Schedule platform setups for an entry as hub tasks, without waiting for them.
    ///
    /// A later [`ConfigEntries::unload_platforms`] for the entry waits until
    /// every scheduled setup has finished.
    pub async fn schedule_forward_setups(
        &self,
        hass: &Arc<HomeAssistant>,
        entry: &ConfigEntry,
        platforms: &[&'static str],
    ) {
        let gate = self.forward_gate(&entry.entry_id);
        for platform in platforms.iter().copied() {
            let in_flight = gate.clone().read_owned().await;
            let task_hass = hass.clone();
            let entry = entry.clone();
            hass.create_task(async move {
                let _in_flight = in_flight;
                if let Err(e) = task_hass
                    .config_entries
                    .forward_entry_setup(&task_hass, &entry, platform)
                    .await
                {
                    warn!(
                        "Error setting up {} platform for {}: {}",
                        platform, entry.title, e
                    );
                }
            });
        }
    }

    /// Unload one platform for an entry; a platform that was never set up counts as unloaded
    pub async fn forward_entry_unload(
        &self,
        hass: &Arc<HomeAssistant>,
        entry: &ConfigEntry,
        platform: &str,
    ) -> ConfigEntriesResult<bool> {
        let is_loaded = self
            .loaded_platforms
            .get(&entry.entry_id)
            .is_some_and(|set| set.contains(platform));
        if !is_loaded {
            return Ok(true);
        }

        let handler = self.platform(&entry.domain, platform)?;
        let unloaded = handler
            .async_unload_entry(hass, entry)
            .await
            .map_err(|source| ConfigEntriesError::PlatformFailed {
                domain: entry.domain.clone(),
                platform: platform.to_string(),
                entry_id: entry.entry_id.clone(),
                source,
            })?;

        if unloaded {
            if let Some(mut set) = self.loaded_platforms.get_mut(&entry.entry_id) {
                set.remove(platform);
            }
        }
        Ok(unloaded)
    }

    /// Unload several platforms concurrently; true only if every one unloaded.
    ///
    /// Scheduled platform setups for the entry are awaited first.
    pub async fn unload_platforms(
        &self,
        hass: &Arc<HomeAssistant>,
        entry: &ConfigEntry,
        platforms: &[&str],
    ) -> ConfigEntriesResult<bool> {
        let gate = self.forward_gate(&entry.entry_id);
        let _settled = gate.write().await;

        let results = futures::future::join_all(
            platforms
                .iter()
                .map(|platform| self.forward_entry_unload(hass, entry, platform)),
        )
        .await;

        let mut all_unloaded = true;
        for result in results {
            all_unloaded &= result?;
        }
        Ok(all_unloaded)
    }

    fn platform(&self, domain: &str, platform: &str) -> ConfigEntriesResult<Arc<dyn EntryPlatform>> {
        self.platforms
            .get(&(domain.to_string(), platform.to_string()))
            .map(|r| r.value().clone())
            .ok_or_else(|| ConfigEntriesError::PlatformNotFound {
                domain: domain.to_string(),
                platform: platform.to_string(),
            })
    }

    /// Platforms currently set up for an entry, sorted
    pub fn loaded_platforms(&self, entry_id: &str) -> Vec<String> {
        let mut platforms: Vec<String> = self
            .loaded_platforms
            .get(entry_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        platforms.sort();
        platforms
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = ConfigEntry> + '_ {
        self.entries.iter().map(|r| r.value().clone())
    }
}
