//! Error types for the hOn integration

use ha_config::ConfigError;
use ha_config_entries::{BoxError, ConfigEntriesError};
use thiserror::Error;

pub type HonResult<T> = Result<T, HonError>;

#[derive(Debug, Error)]
pub enum HonError {
    /// The host has no config directory to hand to the client
    #[error("Missing Config Dir")]
    MissingConfigDir,

    /// Entry data lacks a required credential
    #[error("config entry is missing '{0}'")]
    MissingData(&'static str),

    /// Raised by the remote client (authentication, network), passed through as is
    #[error(transparent)]
    Client(BoxError),

    /// Unload of an instance that has no live session
    #[error("no hOn session registered for instance {instance_id}")]
    SessionNotFound { instance_id: String },

    #[error(transparent)]
    ConfigEntries(#[from] ConfigEntriesError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl HonError {
    /// Convert for the host, unwrapping client errors so their type survives
    pub fn into_box_error(self) -> BoxError {
        match self {
            HonError::Client(source) => source,
            other => Box::new(other),
        }
    }
}
