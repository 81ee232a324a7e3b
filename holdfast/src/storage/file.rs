//! Directory-backed storage.
//!
//! # File Layout
//!
//! Each key is stored in its own file:
//! ```text
//! {directory}/{hex(key)}.kv
//! ```
//!
//! Hex encoding keeps arbitrary keys safe as filenames on every platform and
//! lets [`KeyValueStore::keys`] recover the original key. Writes go to a
//! temporary file first and are renamed into place, so readers never see a
//! partially written value.

use super::{KeyValueStore, StorageError};
use futures::future::BoxFuture;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

const VALUE_EXTENSION: &str = "kv";
const TEMP_EXTENSION: &str = "tmp";

/// Storage that keeps one file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    directory: PathBuf,
}

impl FileStorage {
    /// Opens storage rooted at `directory`, creating it if needed.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await?;
        info!(dir = %directory.display(), "File storage opened");
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{}", hex::encode(key.as_bytes()), VALUE_EXTENSION))
    }

    fn key_from_path(path: &Path) -> Option<String> {
        if path.extension()?.to_str()? != VALUE_EXTENSION {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let raw = hex::decode(stem).ok()?;
        String::from_utf8(raw).ok()
    }

    async fn list_value_files(&self) -> Result<Vec<(PathBuf, String)>, StorageError> {
        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(key) = Self::key_from_path(&path) {
                files.push((path, key));
            }
        }
        Ok(files)
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, StorageError>> {
        let path = self.key_path(key);
        Box::pin(async move {
            match tokio::fs::read(&path).await {
                Ok(data) => Ok(Some(data)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn set(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), StorageError>> {
        let path = self.key_path(key);
        let temp_path = path.with_extension(format!("{}.{}", Uuid::new_v4().simple(), TEMP_EXTENSION));
        Box::pin(async move {
            tokio::fs::write(&temp_path, &value).await?;
            if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(e.into());
            }
            debug!(path = %path.display(), bytes = value.len(), "Stored value");
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, Result<bool, StorageError>> {
        let path = self.key_path(key);
        Box::pin(async move {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), StorageError>> {
        Box::pin(async move {
            for (path, _) in self.list_value_files().await? {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(())
        })
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StorageError>> {
        Box::pin(async move {
            Ok(self
                .list_value_files()
                .await?
                .into_iter()
                .map(|(_, key)| key)
                .collect())
        })
    }
}
