//! Versioned JSON persistence under `<config_dir>/.storage/`

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported version for {key}: expected {expected}, found {found}")]
    VersionMismatch {
        key: String,
        expected: u32,
        found: u32,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage file envelope
///
/// ```json
/// { "version": 1, "minor_version": 5, "key": "core.config_entries", "data": { ... } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageFile<T> {
    pub version: u32,
    pub minor_version: u32,
    pub key: String,
    pub data: T,
}

/// Handle on the `.storage/` directory
#[derive(Debug, Clone)]
pub struct Storage {
    storage_dir: PathBuf,
}

impl Storage {
    /// Storage rooted at `<config_dir>/.storage`
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            storage_dir: config_dir.as_ref().join(".storage"),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn file_path(&self, key: &str) -> PathBuf {
        self.storage_dir.join(key)
    }

    /// Load a storage file, `None` if it doesn't exist.
    ///
    /// Files written by a newer major version are rejected.
    pub async fn load<T>(&self, key: &str, max_version: u32) -> StorageResult<Option<StorageFile<T>>>
    where
        T: DeserializeOwned,
    {
        let path = self.file_path(key);
        if !fs::try_exists(&path).await? {
            debug!("Storage file not found: {}", key);
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let file: StorageFile<T> = serde_json::from_str(&content)?;
        if file.version > max_version {
            return Err(StorageError::VersionMismatch {
                key: key.to_string(),
                expected: max_version,
                found: file.version,
            });
        }

        debug!(
            "Loaded storage file: {} (v{}.{})",
            key, file.version, file.minor_version
        );
        Ok(Some(file))
    }

    /// Save a storage file atomically (temp file + rename)
    pub async fn save<T>(&self, file: &StorageFile<T>) -> StorageResult<()>
    where
        T: Serialize,
    {
        fs::create_dir_all(&self.storage_dir).await?;

        let path = self.file_path(&file.key);
        let temp_path = self.file_path(&format!("{}.tmp", file.key));
        let content = serde_json::to_string_pretty(file)?;

        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &path).await?;

        debug!(
            "Saved storage file: {} (v{}.{})",
            file.key, file.version, file.minor_version
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path());

        let file = StorageFile {
            version: 1,
            minor_version: 2,
            key: "test.key".to_string(),
            data: json!({"entries": []}),
        };
        storage.save(&file).await.unwrap();
        assert!(storage.file_path("test.key").exists());
        assert!(!storage.file_path("test.key.tmp").exists());

        let loaded = storage
            .load::<serde_json::Value>("test.key", 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.minor_version, 2);
        assert_eq!(loaded.data, json!({"entries": []}));
    }

    #[tokio::test]
    async fn test_load_missing() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path());
        let loaded = storage.load::<serde_json::Value>("missing", 1).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_newer_version_rejected() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path());
        let file = StorageFile {
            version: 3,
            minor_version: 1,
            key: "future".to_string(),
            data: json!({}),
        };
        storage.save(&file).await.unwrap();

        let result = storage.load::<serde_json::Value>("future", 1).await;
        assert!(matches!(
            result,
            Err(StorageError::VersionMismatch { found: 3, .. })
        ));
    }
}
