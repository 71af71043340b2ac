//! Test doubles for the hOn client and platform modules

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ha_config::CoreConfig;
use ha_config_entries::{
    BoxError, ConfigEntry, EntryPlatform, HomeAssistant, HookResult,
};
use hon::{
    HonAccount, HonConfig, HonConnector, HonIntegration, CONF_EMAIL, CONF_PASSWORD,
    CONF_REFRESH_TOKEN, DOMAIN, PLATFORMS,
};

/// Install a log subscriber once; `RUST_LOG=debug` shows integration logs
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Error type the fake client raises, to check it reaches the host untouched
#[derive(Debug, thiserror::Error)]
#[error("authentication failed for {email}")]
pub struct AuthError {
    pub email: String,
}

/// An account whose token the test can rotate
pub struct FakeAccount {
    pub email: String,
    token: Mutex<String>,
}

impl FakeAccount {
    pub fn rotate(&self, token: &str) {
        *self.token.lock().unwrap() = token.to_string();
    }
}

impl HonAccount for FakeAccount {
    fn refresh_token(&self) -> String {
        self.token.lock().unwrap().clone()
    }
}

/// Connector that records every config it receives.
///
/// A cached token is rotated during authentication (`<token>+1`), a fresh
/// login yields `fresh-<email>`.
#[derive(Default)]
pub struct RecordingConnector {
    calls: Mutex<Vec<HonConfig>>,
    accounts: Mutex<Vec<Arc<FakeAccount>>>,
    reject: Mutex<bool>,
}

impl RecordingConnector {
    pub fn reject_logins(&self) {
        *self.reject.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<HonConfig> {
        self.calls.lock().unwrap().clone()
    }

    pub fn account(&self, email: &str) -> Arc<FakeAccount> {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|a| a.email == email)
            .cloned()
            .expect("no account created for email")
    }
}

#[async_trait]
impl HonConnector for RecordingConnector {
    async fn create(&self, config: HonConfig) -> Result<Arc<dyn HonAccount>, BoxError> {
        self.calls.lock().unwrap().push(config.clone());
        // yield like a real network handshake would
        tokio::task::yield_now().await;

        if *self.reject.lock().unwrap() {
            return Err(Box::new(AuthError {
                email: config.email,
            }));
        }

        let token = match config.refresh_token {
            Some(cached) => format!("{cached}+1"),
            None => format!("fresh-{}", config.email),
        };
        let account = Arc::new(FakeAccount {
            email: config.email,
            token: Mutex::new(token),
        });
        self.accounts.lock().unwrap().push(account.clone());
        Ok(account)
    }
}

/// Platform module that records what it saw
#[derive(Default)]
pub struct RecordingPlatform {
    pub refuse_unload: bool,
    /// Simulated time a platform needs to come up
    pub setup_delay: Duration,
    pub setups: AtomicUsize,
    /// Refresh token stored in the entry when unload was requested
    pub tokens_at_unload: Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl EntryPlatform for RecordingPlatform {
    async fn async_setup_entry(&self, _hass: &Arc<HomeAssistant>, _entry: &ConfigEntry) -> HookResult {
        if !self.setup_delay.is_zero() {
            tokio::time::sleep(self.setup_delay).await;
        }
        self.setups.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn async_unload_entry(&self, hass: &Arc<HomeAssistant>, entry: &ConfigEntry) -> HookResult {
        let stored = hass
            .config_entries
            .get(&entry.entry_id)
            .and_then(|e| e.data_str(CONF_REFRESH_TOKEN).map(str::to_string));
        self.tokens_at_unload.lock().unwrap().push(stored);
        Ok(!self.refuse_unload)
    }
}

pub struct Harness {
    pub hass: Arc<HomeAssistant>,
    pub hon: Arc<HonIntegration>,
    pub connector: Arc<RecordingConnector>,
    pub sensor: Arc<RecordingPlatform>,
}

/// Hub with the hOn integration and every platform registered
pub fn harness(config_dir: Option<&Path>) -> Harness {
    harness_with_sensor(config_dir, RecordingPlatform::default())
}

pub fn harness_with_sensor(config_dir: Option<&Path>, sensor: RecordingPlatform) -> Harness {
    init_tracing();

    let mut config = CoreConfig::default();
    if let Some(dir) = config_dir {
        config = config.with_config_dir(dir);
    }
    let hass = HomeAssistant::new(config);
    register(&hass, sensor)
}

pub fn register(hass: &Arc<HomeAssistant>, sensor: RecordingPlatform) -> Harness {
    let connector = Arc::new(RecordingConnector::default());
    let hon = Arc::new(HonIntegration::new(connector.clone()));
    hass.config_entries.register_integration(hon.clone());

    let sensor = Arc::new(sensor);
    for platform in PLATFORMS {
        if *platform == "sensor" {
            hass.config_entries
                .register_platform(DOMAIN, platform, sensor.clone());
        } else {
            hass.config_entries
                .register_platform(DOMAIN, platform, Arc::new(RecordingPlatform::default()));
        }
    }

    Harness {
        hass: hass.clone(),
        hon,
        connector,
        sensor,
    }
}

/// Add an hOn entry keyed by its email
pub async fn add_account(
    hass: &Arc<HomeAssistant>,
    email: &str,
    refresh_token: Option<&str>,
) -> ConfigEntry {
    let mut entry = ConfigEntry::new(DOMAIN, email)
        .with_unique_id(email)
        .with_data_value(CONF_EMAIL, email)
        .with_data_value(CONF_PASSWORD, "hunter2");
    if let Some(token) = refresh_token {
        entry = entry.with_data_value(CONF_REFRESH_TOKEN, token);
    }
    hass.config_entries.add(entry).await.unwrap()
}

/// Stored refresh token of an entry
pub fn stored_token(hass: &HomeAssistant, entry_id: &str) -> Option<String> {
    hass.config_entries
        .get(entry_id)?
        .data_str(CONF_REFRESH_TOKEN)
        .map(str::to_string)
}
