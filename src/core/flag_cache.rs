use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::flags::{detail_from_legacy, FlagsResponse};
use crate::storage::{PersistedStore, PersistedStoreExt, PersistenceKey};
use crate::types::{FeatureFlagDetail, FlagValue, Properties};

/// Flag state as persisted under `feature_flag_details`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagsState {
    #[serde(default)]
    pub flags: HashMap<String, FeatureFlagDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// The last known flag values, served to every flag read.
///
/// Per-flag details are the single stored form; the legacy
/// `feature_flags`/`feature_flag_payloads` maps are projected on read.
pub struct FlagCache {
    store: Arc<dyn PersistedStore>,
    state: RwLock<FlagsState>,
}

impl FlagCache {
    /// Open the cache, serving whatever a previous process persisted.
    pub fn new(store: Arc<dyn PersistedStore>) -> Self {
        let state: FlagsState = store
            .get_json(PersistenceKey::FeatureFlagDetails)
            .unwrap_or_default();
        Self {
            store,
            state: RwLock::new(state),
        }
    }

    /// Seed flags from bootstrap values. Skipped when flags were persisted.
    pub fn bootstrap(&self, flags: &HashMap<String, FlagValue>, payloads: &HashMap<String, Value>) {
        let mut state = self.state.write();
        if !state.flags.is_empty() || flags.is_empty() {
            return;
        }

        state.flags = flags
            .iter()
            .map(|(key, value)| {
                let value = Value::from(value.clone());
                (key.clone(), detail_from_legacy(key, &value, payloads.get(key)))
            })
            .collect();
        tracing::debug!(count = state.flags.len(), "Seeded bootstrap flags");
        self.persist(&state);
    }

    /// Fold a successful response into the cache.
    ///
    /// A partial response is merged over the cached flags, a response
    /// quota-limited for flags clears them, anything else replaces them.
    /// Returns whether the flag values changed.
    pub fn apply(&self, response: &FlagsResponse) -> bool {
        let mut state = self.state.write();
        let before = state.flags.clone();

        if response.is_quota_limited() {
            tracing::warn!("Feature flags are quota limited, clearing cached flags");
            state.flags.clear();
        } else if response.errors_while_computing_flags {
            for (key, detail) in &response.flags {
                state.flags.insert(key.clone(), detail.clone());
            }
        } else {
            state.flags = response.flags.clone();
        }
        state.request_id = response.request_id.clone();

        self.persist(&state);
        state.flags != before
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        *state = FlagsState::default();
        self.store.remove(PersistenceKey::FeatureFlagDetails);
    }

    pub fn get_detail(&self, key: &str) -> Option<FeatureFlagDetail> {
        self.state.read().flags.get(key).cloned()
    }

    pub fn get_flag(&self, key: &str) -> Option<FlagValue> {
        self.state.read().flags.get(key).map(FeatureFlagDetail::value)
    }

    pub fn get_payload(&self, key: &str) -> Option<Value> {
        self.state.read().flags.get(key).and_then(FeatureFlagDetail::payload)
    }

    pub fn details(&self) -> HashMap<String, FeatureFlagDetail> {
        self.state.read().flags.clone()
    }

    pub fn feature_flags(&self) -> HashMap<String, FlagValue> {
        self.state
            .read()
            .flags
            .iter()
            .map(|(k, d)| (k.clone(), d.value()))
            .collect()
    }

    pub fn feature_flag_payloads(&self) -> HashMap<String, Value> {
        self.state
            .read()
            .flags
            .iter()
            .filter_map(|(k, d)| d.payload().map(|p| (k.clone(), p)))
            .collect()
    }

    pub fn request_id(&self) -> Option<String> {
        self.state.read().request_id.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().flags.is_empty()
    }

    /// `$feature/<key>` for every cached flag plus the sorted list of
    /// enabled keys as `$active_feature_flags`.
    pub fn enrichment_properties(&self) -> Properties {
        let state = self.state.read();
        let mut props = Properties::new();
        if state.flags.is_empty() {
            return props;
        }

        let mut active: Vec<&str> = Vec::new();
        for (key, detail) in &state.flags {
            let value = detail.value();
            if value.is_enabled() {
                active.push(key);
            }
            props.insert(format!("$feature/{key}"), value.into());
        }
        active.sort_unstable();
        props.insert("$active_feature_flags".to_string(), active.into());
        props
    }

    fn persist(&self, state: &FlagsState) {
        self.store.set_json(PersistenceKey::FeatureFlagDetails, state);
    }
}
