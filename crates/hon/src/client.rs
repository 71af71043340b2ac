//! Contract with the remote hOn client library
//!
//! The integration never talks to the cloud itself. It hands a
//! [`HonConfig`] to a [`HonConnector`], which performs the authentication
//! handshake (retrying as it sees fit) and returns a live [`HonAccount`].

use async_trait::async_trait;
use ha_config_entries::BoxError;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything the client needs to open an account session
#[derive(Clone)]
pub struct HonConfig {
    pub email: String,
    pub password: String,
    pub mobile_id: String,
    /// Shared host session, borrowed; the client must not close it
    pub session: reqwest::Client,
    /// Where the client may read/write appliance test data
    pub test_data_path: PathBuf,
    /// Cached token to resume the session without a full login
    pub refresh_token: Option<String>,
}

impl fmt::Debug for HonConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HonConfig")
            .field("email", &self.email)
            .field("password", &"**REDACTED**")
            .field("mobile_id", &self.mobile_id)
            .field("test_data_path", &self.test_data_path)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "**REDACTED**"))
            .finish_non_exhaustive()
    }
}

/// An authenticated account session
pub trait HonAccount: Send + Sync {
    /// The current refresh token; the client may rotate it at any time
    fn refresh_token(&self) -> String;
}

/// Factory half of the client library
#[async_trait]
pub trait HonConnector: Send + Sync {
    /// Authenticate and return a live session.
    ///
    /// Errors are surfaced to the host unchanged.
    async fn create(&self, config: HonConfig) -> Result<Arc<dyn HonAccount>, BoxError>;
}
