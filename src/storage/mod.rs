//! Persistence seam for identity, queue and flag state.
//!
//! The engine stores every piece of durable state as a JSON string under a
//! fixed key. Hosts supply the backend by implementing [`PersistedStore`];
//! [`MemoryStore`] and [`FileStore`] cover the common cases.

mod file;

pub use file::FileStore;

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;

/// Keys the engine reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistenceKey {
    DistinctId,
    AnonymousId,
    IsIdentified,
    Queue,
    GroupProperties,
    PersonProperties,
    OptOut,
    Props,
    SessionId,
    SessionLastTimestamp,
    FeatureFlagDetails,
}

impl PersistenceKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersistenceKey::DistinctId => "distinct_id",
            PersistenceKey::AnonymousId => "anonymous_id",
            PersistenceKey::IsIdentified => "is_identified",
            PersistenceKey::Queue => "queue",
            PersistenceKey::GroupProperties => "group_properties",
            PersistenceKey::PersonProperties => "person_properties",
            PersistenceKey::OptOut => "opt_out",
            PersistenceKey::Props => "props",
            PersistenceKey::SessionId => "session_id",
            PersistenceKey::SessionLastTimestamp => "session_last_timestamp",
            PersistenceKey::FeatureFlagDetails => "feature_flag_details",
        }
    }

    /// Every key the engine owns, used by `reset`.
    pub fn all() -> &'static [PersistenceKey] {
        &[
            PersistenceKey::DistinctId,
            PersistenceKey::AnonymousId,
            PersistenceKey::IsIdentified,
            PersistenceKey::Queue,
            PersistenceKey::GroupProperties,
            PersistenceKey::PersonProperties,
            PersistenceKey::OptOut,
            PersistenceKey::Props,
            PersistenceKey::SessionId,
            PersistenceKey::SessionLastTimestamp,
            PersistenceKey::FeatureFlagDetails,
        ]
    }
}

/// Key/value backend holding JSON strings.
///
/// Implementations must be cheap to call from synchronous code; the engine
/// never holds one of its own locks while calling into the store for longer
/// than a single read or write.
pub trait PersistedStore: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: String);
    fn remove_item(&self, key: &str);
}

/// Typed JSON access on top of a [`PersistedStore`].
pub(crate) trait PersistedStoreExt {
    fn get_json<T: DeserializeOwned>(&self, key: PersistenceKey) -> Option<T>;
    fn set_json<T: Serialize>(&self, key: PersistenceKey, value: &T);
    fn remove(&self, key: PersistenceKey);
}

impl<S: PersistedStore + ?Sized> PersistedStoreExt for S {
    fn get_json<T: DeserializeOwned>(&self, key: PersistenceKey) -> Option<T> {
        let raw = self.get_item(key.as_str())?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = key.as_str(), error = %e, "Discarding unreadable persisted value");
                None
            }
        }
    }

    fn set_json<T: Serialize>(&self, key: PersistenceKey, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_item(key.as_str(), raw),
            Err(e) => {
                tracing::error!(key = key.as_str(), error = %e, "Failed to serialize persisted value");
            }
        }
    }

    fn remove(&self, key: PersistenceKey) {
        self.remove_item(key.as_str());
    }
}

/// Process-local store. State is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl PersistedStore for MemoryStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: String) {
        self.items.write().insert(key.to_string(), value);
    }

    fn remove_item(&self, key: &str) {
        self.items.write().remove(key);
    }
}
