//! Errors raised while reading `configuration.yaml` and validating integration sections

use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// `configuration.yaml` or `secrets.yaml` could not be read
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `!secret <key>` with no matching entry, e.g. a missing `hon_password`
    #[error("secret '{key}' not defined in secrets.yaml")]
    SecretNotFound { key: String },

    /// `!env_var <var>` naming an unset variable
    #[error("environment variable '{var}' is not set")]
    EnvVarNotFound { var: String },

    /// A value of the wrong shape: a non-scalar secret, a bad tag
    /// argument, or a malformed `homeassistant:` section
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// An integration section rejected by its schema.
    ///
    /// `message` locates the offending key, as in
    /// `required key not provided @ hon[0][password]`.
    #[error("invalid config: {message}")]
    ValidationFailed { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_shown_verbatim() {
        let err = ConfigError::ValidationFailed {
            message: "extra keys not allowed @ hon[region]".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config: extra keys not allowed @ hon[region]"
        );
    }
}
