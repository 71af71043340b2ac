//! Config Entries
//!
//! The host side of the integration lifecycle. Config entries represent
//! individual integration instances; this crate stores them, drives their
//! setup/unload through the owning integration and forwards them to
//! platform modules.
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - A single integration configuration
//! - [`ConfigEntryState`] - Lifecycle state of an entry
//! - [`ConfigEntries`] - Manager for all config entries
//! - [`HomeAssistant`] - Hub handed to integrations (config, entries, client session, tasks)
//! - [`Integration`] / [`EntryPlatform`] - Hooks integrations implement
//!
//! # Storage
//!
//! Config entries are persisted in `.storage/core.config_entries` with
//! version tracking.

pub mod entry;
pub mod hass;
pub mod integration;
pub mod manager;
pub mod state_machine;
pub mod storage;

pub use entry::{
    ConfigEntry, ConfigEntryDisabledBy, ConfigEntrySource, ConfigEntryState, ConfigEntryUpdate,
};
pub use hass::HomeAssistant;
pub use integration::{BoxError, EntryPlatform, HookResult, Integration};
pub use manager::{
    ConfigEntries, ConfigEntriesData, ConfigEntriesError, ConfigEntriesResult, STORAGE_KEY,
    STORAGE_MINOR_VERSION, STORAGE_VERSION,
};
pub use state_machine::InvalidTransition;
pub use storage::{Storage, StorageError, StorageFile, StorageResult};
