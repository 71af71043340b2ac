//! YAML loader with `!secret` and `!env_var` substitution

use crate::error::{ConfigError, ConfigResult};
use crate::secrets::Secrets;
use serde_yaml::value::TaggedValue;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// YAML loader bound to a config directory
pub struct YamlLoader {
    config_dir: PathBuf,
    secrets: Secrets,
}

impl YamlLoader {
    /// Create a loader, reading `secrets.yaml` from the config directory
    pub fn new(config_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let config_dir = config_dir.into();
        let secrets = Secrets::load(&config_dir)?;
        Ok(Self {
            config_dir,
            secrets,
        })
    }

    /// Create a loader with pre-loaded secrets
    pub fn with_secrets(config_dir: impl Into<PathBuf>, secrets: Secrets) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets,
        }
    }

    /// Load and process a YAML file, relative paths resolve against the config directory
    pub fn load_file(&self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        };
        debug!("Loading YAML file: {:?}", path);

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;
        self.load_string(&content, &path)
    }

    /// Load and process YAML from a string
    pub fn load_string(&self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;
        self.process_value(value)
    }

    fn process_value(&self, value: Value) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::with_capacity(map.len());
                for (k, v) in map {
                    result.insert(k, self.process_value(v)?);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.process_value(v))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            other => Ok(other),
        }
    }

    fn process_tagged(&self, tagged: TaggedValue) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!("Processing tag '{}'", tag);

        match tag.as_str() {
            "!secret" => {
                let key = tag_argument(&tag, tagged.value)?;
                let secret = self.secrets.get(&key)?;
                debug!("Substituted secret: {}", key);
                Ok(Value::String(secret.to_string()))
            }
            "!env_var" => {
                let var = tag_argument(&tag, tagged.value)?;
                let value = std::env::var(&var)
                    .map_err(|_| ConfigError::EnvVarNotFound { var: var.clone() })?;
                debug!("Substituted env var: {}", var);
                Ok(Value::String(value))
            }
            _ => Ok(Value::Tagged(Box::new(TaggedValue {
                tag: tagged.tag,
                value: self.process_value(tagged.value)?,
            }))),
        }
    }
}

fn tag_argument(tag: &str, value: Value) -> ConfigResult<String> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(ConfigError::InvalidValue {
            key: tag.to_string(),
            reason: "tag argument must be a string".to_string(),
        }),
    }
}

/// Load a YAML file with tag processing
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new(config_dir)?.load_file(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_secret_substitution() {
        let loader = YamlLoader::with_secrets(
            "/config",
            Secrets::from_pairs([("hon_password", "hunter2")]),
        );
        let value = loader
            .load_string(
                "hon:\n  email: user@example.com\n  password: !secret hon_password\n",
                Path::new("configuration.yaml"),
            )
            .unwrap();

        assert_eq!(value["hon"]["password"], Value::String("hunter2".into()));
        assert_eq!(
            value["hon"]["email"],
            Value::String("user@example.com".into())
        );
    }

    #[test]
    fn test_missing_secret() {
        let loader = YamlLoader::with_secrets("/config", Secrets::default());
        let result = loader.load_string("key: !secret nope\n", Path::new("configuration.yaml"));
        assert!(matches!(result, Err(ConfigError::SecretNotFound { .. })));
    }

    #[test]
    fn test_unknown_tag_preserved() {
        let loader = YamlLoader::with_secrets("/config", Secrets::default());
        let value = loader
            .load_string("key: !custom value\n", Path::new("configuration.yaml"))
            .unwrap();
        assert!(matches!(value["key"], Value::Tagged(_)));
    }

    #[test]
    fn test_load_file_relative_to_config_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("secrets.yaml"), "pw: abc\n").unwrap();
        fs::write(
            dir.path().join("configuration.yaml"),
            "hon:\n  - email: a@b.c\n    password: !secret pw\n",
        )
        .unwrap();

        let value = load_yaml(dir.path(), "configuration.yaml").unwrap();
        assert_eq!(value["hon"][0]["password"], Value::String("abc".into()));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = load_yaml(dir.path(), "configuration.yaml");
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
