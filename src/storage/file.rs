//! File-backed store.
//!
//! All keys live in one JSON document. Every mutation rewrites the document
//! to a sibling temp file under an exclusive advisory lock, syncs it and
//! renames it over the original, so a crash leaves either the old or the new
//! document on disk, never a torn one.

use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::PersistedStore;
use crate::error::{ErrorCode, PostHogError, Result};

pub struct FileStore {
    path: PathBuf,
    lock_file_path: PathBuf,
    items: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Open (or create) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or an
    /// existing document cannot be parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                PostHogError::with_source(
                    ErrorCode::StorageError,
                    format!("Failed to create storage directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        let items = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|e| {
                PostHogError::with_source(
                    ErrorCode::StorageError,
                    format!("Failed to read store: {}", path.display()),
                    e,
                )
            })?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            HashMap::new()
        };

        let lock_file_path = path.with_extension("lock");

        tracing::debug!(path = %path.display(), keys = items.len(), "Opened file store");

        Ok(Self {
            path,
            lock_file_path,
            items: RwLock::new(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn acquire_lock(&self) -> Result<File> {
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_file_path)
            .map_err(|e| {
                PostHogError::with_source(ErrorCode::StorageError, "Failed to open lock file", e)
            })?;

        lock_file.lock_exclusive().map_err(|e| {
            PostHogError::with_source(ErrorCode::StorageError, "Failed to acquire file lock", e)
        })?;

        Ok(lock_file)
    }

    fn write_snapshot(&self, items: &HashMap<String, String>) -> Result<()> {
        let lock_file = self.acquire_lock()?;

        let serialized = serde_json::to_string(items)?;
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path).map_err(|e| {
                PostHogError::with_source(ErrorCode::StorageError, "Failed to create temp file", e)
            })?;
            file.write_all(serialized.as_bytes()).map_err(|e| {
                PostHogError::with_source(ErrorCode::StorageError, "Failed to write store", e)
            })?;
            file.sync_all().map_err(|e| {
                PostHogError::with_source(ErrorCode::StorageError, "Failed to sync store", e)
            })?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            PostHogError::with_source(ErrorCode::StorageError, "Failed to replace store", e)
        })?;

        let _ = lock_file.unlock();
        Ok(())
    }

    fn persist(&self, items: &HashMap<String, String>) {
        if let Err(e) = self.write_snapshot(items) {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to persist store");
        }
    }
}

impl PersistedStore for FileStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: String) {
        let mut items = self.items.write();
        items.insert(key.to_string(), value);
        self.persist(&items);
    }

    fn remove_item(&self, key: &str) {
        let mut items = self.items.write();
        if items.remove(key).is_some() {
            self.persist(&items);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("posthog.json");
        let store = FileStore::open(&path).unwrap();
        store.set_item("distinct_id", "\"u\"".to_string());
        assert!(path.exists());
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("posthog.json");
        {
            let store = FileStore::open(&path).unwrap();
            store.set_item("anonymous_id", "\"anon-1\"".to_string());
            store.set_item("opt_out", "true".to_string());
            store.remove_item("opt_out");
        }

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get_item("anonymous_id").as_deref(), Some("\"anon-1\""));
        assert!(reopened.get_item("opt_out").is_none());
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("posthog.json");
        fs::write(&path, "{not json").unwrap();

        let result = FileStore::open(&path);
        assert!(matches!(result, Err(e) if e.code == ErrorCode::SerializationError));
    }
}
