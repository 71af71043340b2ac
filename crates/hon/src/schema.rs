//! `configuration.yaml` schema for the `hon:` section
//!
//! ```yaml
//! hon:
//!   - email: user@example.com
//!     password: !secret hon_password
//! ```
//!
//! A single mapping is accepted in place of a list. Unknown top-level keys
//! belong to other integrations and are ignored; unknown keys inside an
//! account are rejected.

use ha_config::{ConfigError, ConfigResult, Value};

use crate::constants::{CONF_EMAIL, CONF_PASSWORD, DOMAIN};

/// One account from YAML
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HonAccountConfig {
    pub email: String,
    pub password: String,
}

/// Validate a whole configuration document, returning the `hon:` accounts
pub fn validate_config(config: &Value) -> ConfigResult<Vec<HonAccountConfig>> {
    if !config.is_mapping() {
        return Err(invalid(String::new(), "expected a dictionary"));
    }
    match ha_config::integration_section(config, DOMAIN) {
        Some(section) => validate_section(section),
        None => Ok(Vec::new()),
    }
}

/// Validate the value of the `hon:` key
pub fn validate_section(section: &Value) -> ConfigResult<Vec<HonAccountConfig>> {
    match section {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(accounts) => accounts
            .iter()
            .enumerate()
            .map(|(index, account)| validate_account(account, &format!("{DOMAIN}[{index}]")))
            .collect(),
        account => Ok(vec![validate_account(account, DOMAIN)?]),
    }
}

fn validate_account(account: &Value, path: &str) -> ConfigResult<HonAccountConfig> {
    let mapping = account
        .as_mapping()
        .ok_or_else(|| invalid(path.to_string(), "expected a dictionary"))?;

    for key in mapping.keys() {
        match key.as_str() {
            Some(CONF_EMAIL | CONF_PASSWORD) => {}
            _ => {
                return Err(invalid(
                    format!("{path}[{}]", describe(key)),
                    "extra keys not allowed",
                ))
            }
        }
    }

    Ok(HonAccountConfig {
        email: coerce_string(mapping.get(CONF_EMAIL), path, CONF_EMAIL)?,
        password: coerce_string(mapping.get(CONF_PASSWORD), path, CONF_PASSWORD)?,
    })
}

/// Scalars become strings (booleans spelled `True`/`False`); null, lists
/// and mappings are rejected
fn coerce_string(value: Option<&Value>, path: &str, key: &str) -> ConfigResult<String> {
    let location = format!("{path}[{key}]");
    match value {
        None => Err(invalid(location, "required key not provided")),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(true)) => Ok("True".to_string()),
        Some(Value::Bool(false)) => Ok("False".to_string()),
        Some(_) => Err(invalid(location, "expected str")),
    }
}

fn describe(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => format!("{other:?}"),
    }
}

fn invalid(location: String, message: &str) -> ConfigError {
    let message = if location.is_empty() {
        message.to_string()
    } else {
        format!("{message} @ {location}")
    };
    ConfigError::ValidationFailed { message }
}
