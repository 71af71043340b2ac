//! Config entry types
//!
//! A [`ConfigEntry`] is one user-configured instance of an integration:
//! its credentials, cached tokens and lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::state_machine::InvalidTransition;

/// Config entry lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryState {
    /// Initial state, not yet set up
    #[default]
    NotLoaded,
    /// Integration setup is running
    SetupInProgress,
    /// Successfully set up
    Loaded,
    /// Setup returned false
    SetupError,
    /// Setup raised, the integration is unavailable and may be retried
    SetupRetry,
    /// Integration unload is running
    UnloadInProgress,
    /// Unload failed (terminal)
    FailedUnload,
}

/// Origin of the config entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntrySource {
    /// Created through the UI/API
    #[default]
    User,
    /// Imported from YAML
    Import,
}

/// Reason an entry was disabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryDisabledBy {
    User,
}

/// A configuration entry for an integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique identifier (ULID)
    pub entry_id: String,

    /// Integration domain (e.g., "hon")
    pub domain: String,

    /// Human-readable display name
    pub title: String,

    /// Persisted configuration data (credentials, cached tokens)
    #[serde(default)]
    pub data: HashMap<String, Value>,

    /// User-configurable options
    #[serde(default)]
    pub options: HashMap<String, Value>,

    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_version")]
    pub minor_version: u32,

    /// Identifier assigned by the integration for duplicate prevention
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    #[serde(default)]
    pub source: ConfigEntrySource,

    /// Current lifecycle state (not persisted)
    #[serde(skip, default)]
    pub state: ConfigEntryState,

    /// Explanation for failed states (not persisted)
    #[serde(skip, default)]
    pub reason: Option<String>,

    /// Serializes setup/unload of this entry (not persisted)
    #[serde(skip)]
    pub setup_lock: Arc<Mutex<()>>,

    /// Failed setup attempts since the last successful one (not persisted)
    #[serde(skip, default)]
    pub tries: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_by: Option<ConfigEntryDisabledBy>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl ConfigEntry {
    /// Create a new config entry
    pub fn new(domain: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            entry_id: ulid::Ulid::new().to_string(),
            domain: domain.into(),
            title: title.into(),
            data: HashMap::new(),
            options: HashMap::new(),
            version: 1,
            minor_version: 1,
            unique_id: None,
            source: ConfigEntrySource::User,
            state: ConfigEntryState::NotLoaded,
            reason: None,
            setup_lock: Arc::new(Mutex::new(())),
            tries: 0,
            disabled_by: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Set a single data value
    pub fn with_data_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    pub fn with_source(mut self, source: ConfigEntrySource) -> Self {
        self.source = source;
        self
    }

    pub fn with_disabled_by(mut self, disabled_by: ConfigEntryDisabledBy) -> Self {
        self.disabled_by = Some(disabled_by);
        self
    }

    /// Get a string value from the entry data
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled_by.is_some()
    }

    pub fn is_loaded(&self) -> bool {
        self.state == ConfigEntryState::Loaded
    }

    /// Transition to a new state, validated against the lifecycle graph.
    ///
    /// The retry counter survives only `SetupRetry`/`SetupInProgress`.
    pub fn try_set_state(
        &mut self,
        new_state: ConfigEntryState,
        reason: Option<String>,
    ) -> Result<(), InvalidTransition> {
        self.state.try_transition(new_state)?;
        self.state = new_state;
        self.reason = reason;

        if !matches!(
            new_state,
            ConfigEntryState::SetupRetry | ConfigEntryState::SetupInProgress
        ) {
            self.tries = 0;
        }
        Ok(())
    }
}

/// Partial update of a config entry
#[derive(Debug, Default)]
pub struct ConfigEntryUpdate {
    pub title: Option<String>,
    pub data: Option<HashMap<String, Value>>,
    pub options: Option<HashMap<String, Value>>,
    pub unique_id: Option<Option<String>>,
}

impl ConfigEntryUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Replace the entry data wholesale
    pub fn data(mut self, data: HashMap<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn options(mut self, options: HashMap<String, Value>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn unique_id(mut self, unique_id: Option<String>) -> Self {
        self.unique_id = Some(unique_id);
        self
    }
}
