//! Identity and consent state.
//!
//! The persisted store is the source of truth: every read goes to the
//! store, so two handles sharing a store observe the same identity.

use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{PostHogError, Result};
use crate::storage::{PersistedStore, PersistedStoreExt, PersistenceKey};
use crate::types::Properties;

/// Property keys that steer identity processing and are never forwarded as
/// person properties.
const RESERVED_IDENTIFY_KEYS: &[&str] = &["$set", "$set_once", "$anon_distinct_id", "$groups"];

/// What changed during a successful `identify`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityChange {
    pub previous_distinct_id: String,
    pub distinct_id: String,
}

/// Owns distinct id, anonymous id and opt-out state.
pub struct IdentityManager {
    store: Arc<dyn PersistedStore>,
    default_opt_in: bool,
}

impl IdentityManager {
    pub fn new(store: Arc<dyn PersistedStore>, default_opt_in: bool) -> Self {
        Self {
            store,
            default_opt_in,
        }
    }

    /// The anonymous id, generated and persisted on first use.
    pub fn get_anonymous_id(&self) -> String {
        if let Some(id) = self.store.get_json::<String>(PersistenceKey::AnonymousId) {
            return id;
        }
        let id = Uuid::now_v7().to_string();
        self.store.set_json(PersistenceKey::AnonymousId, &id);
        tracing::debug!(anonymous_id = %id, "Generated anonymous id");
        id
    }

    /// The current distinct id, falling back to the anonymous id.
    pub fn get_distinct_id(&self) -> String {
        self.store
            .get_json::<String>(PersistenceKey::DistinctId)
            .unwrap_or_else(|| self.get_anonymous_id())
    }

    pub fn is_identified(&self) -> bool {
        self.store
            .get_json::<bool>(PersistenceKey::IsIdentified)
            .unwrap_or(false)
    }

    /// Seed identity from bootstrap data. Existing persisted identity wins.
    pub fn bootstrap(&self, distinct_id: &str, is_identified: bool) {
        if self.store.get_item(PersistenceKey::DistinctId.as_str()).is_some() {
            return;
        }
        if is_identified {
            self.store.set_json(PersistenceKey::DistinctId, &distinct_id);
            self.store.set_json(PersistenceKey::IsIdentified, &true);
        } else {
            self.store.set_json(PersistenceKey::AnonymousId, &distinct_id);
        }
    }

    /// Switch to `new_id`.
    ///
    /// Returns `Ok(None)` and writes nothing when `new_id` is already the
    /// current distinct id.
    ///
    /// # Errors
    ///
    /// Returns a `validation_error` for an empty id, before touching state.
    pub fn identify(&self, new_id: &str) -> Result<Option<IdentityChange>> {
        let new_id = new_id.trim();
        if new_id.is_empty() {
            return Err(PostHogError::validation("distinct id must not be empty"));
        }

        let previous = self.get_distinct_id();
        if previous == new_id {
            return Ok(None);
        }

        self.store.set_json(PersistenceKey::DistinctId, &new_id);
        self.store.set_json(PersistenceKey::IsIdentified, &true);
        tracing::debug!(previous = %previous, distinct_id = %new_id, "Identity changed");

        Ok(Some(IdentityChange {
            previous_distinct_id: previous,
            distinct_id: new_id.to_string(),
        }))
    }

    pub fn is_opted_out(&self) -> bool {
        self.store
            .get_json::<bool>(PersistenceKey::OptOut)
            .unwrap_or(!self.default_opt_in)
    }

    pub fn opt_out(&self) {
        self.store.set_json(PersistenceKey::OptOut, &true);
    }

    pub fn opt_in(&self) {
        self.store.set_json(PersistenceKey::OptOut, &false);
    }

    /// Drop every persisted key except the queue and `keep`.
    ///
    /// A fresh anonymous id is generated lazily on the next read.
    pub fn reset(&self, keep: &[PersistenceKey]) {
        for key in PersistenceKey::all() {
            if *key == PersistenceKey::Queue || keep.contains(key) {
                continue;
            }
            self.store.remove(*key);
        }
        tracing::debug!("Identity reset");
    }
}

/// Build the `$identify` / `$set` property block from caller properties.
///
/// `$set` is taken verbatim when given, otherwise every non-reserved key is
/// treated as a person property.
pub fn person_update_properties(properties: &Properties) -> Properties {
    let mut out = Properties::new();

    let set = match properties.get("$set") {
        Some(Value::Object(set)) => set.clone(),
        _ => properties
            .iter()
            .filter(|(k, _)| !RESERVED_IDENTIFY_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    };
    if !set.is_empty() {
        out.insert("$set".to_string(), Value::Object(set));
    }

    if let Some(Value::Object(set_once)) = properties.get("$set_once") {
        out.insert("$set_once".to_string(), Value::Object(set_once.clone()));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn manager() -> (IdentityManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (IdentityManager::new(store.clone(), true), store)
    }

    #[test]
    fn test_anonymous_id_is_stable() {
        let (identity, _) = manager();
        let first = identity.get_anonymous_id();
        assert_eq!(identity.get_anonymous_id(), first);
        assert_eq!(identity.get_distinct_id(), first);
        assert!(!identity.is_identified());
    }

    #[test]
    fn test_identify_reports_previous_id() {
        let (identity, _) = manager();
        let anon = identity.get_anonymous_id();

        let change = identity.identify("user-a").unwrap().unwrap();
        assert_eq!(change.previous_distinct_id, anon);
        assert_eq!(identity.get_distinct_id(), "user-a");
        assert_eq!(identity.get_anonymous_id(), anon);

        let change = identity.identify("user-b").unwrap().unwrap();
        assert_eq!(change.previous_distinct_id, "user-a");
    }

    #[test]
    fn test_identify_same_id_writes_nothing() {
        let (identity, store) = manager();
        identity.identify("user-a").unwrap();
        let before = store.get_item("distinct_id");

        store.remove_item("is_identified");
        assert!(identity.identify("user-a").unwrap().is_none());
        assert_eq!(store.get_item("distinct_id"), before);
        assert!(store.get_item("is_identified").is_none());
    }

    #[test]
    fn test_identify_rejects_empty_id() {
        let (identity, store) = manager();
        let err = identity.identify("  ").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ValidationError);
        assert!(store.get_item("distinct_id").is_none());
    }

    #[test]
    fn test_reset_keeps_queue_and_requested_keys() {
        let (identity, store) = manager();
        identity.identify("user-a").unwrap();
        store.set_item("queue", "[]".to_string());
        store.set_item("props", "{}".to_string());
        identity.opt_out();

        let old_anon = identity.get_anonymous_id();
        identity.reset(&[PersistenceKey::Props]);

        assert!(store.get_item("queue").is_some());
        assert!(store.get_item("props").is_some());
        assert!(store.get_item("distinct_id").is_none());
        assert!(!identity.is_opted_out());
        assert_ne!(identity.get_anonymous_id(), old_anon);
    }

    #[test]
    fn test_default_opt_out() {
        let store = Arc::new(MemoryStore::new());
        let identity = IdentityManager::new(store, false);
        assert!(identity.is_opted_out());
        identity.opt_in();
        assert!(!identity.is_opted_out());
    }

    #[test]
    fn test_bootstrap_does_not_override_persisted_identity() {
        let (identity, _) = manager();
        identity.identify("persisted").unwrap();
        identity.bootstrap("bootstrapped", true);
        assert_eq!(identity.get_distinct_id(), "persisted");
    }

    #[test]
    fn test_person_update_properties() {
        let props = json!({"email": "a@b.c", "$set_once": {"first_seen": "today"}});
        let out = person_update_properties(props.as_object().unwrap());
        assert_eq!(out["$set"], json!({"email": "a@b.c"}));
        assert_eq!(out["$set_once"], json!({"first_seen": "today"}));

        let explicit = json!({"$set": {"plan": "pro"}, "ignored": 1});
        let out = person_update_properties(explicit.as_object().unwrap());
        assert_eq!(out["$set"], json!({"plan": "pro"}));
    }
}
