//! Exactly-once delivery of the remote configuration callback.
//!
//! The callback can be satisfied by two responses: the remote config
//! response itself, or the flags response that the remote config asks for.
//! The source is decided once per bootstrap from the remote config body,
//! and a latch guarantees at most one firing per client. While the
//! bootstrap flags reload is pending, an internal reload for the current
//! identity can satisfy the callback instead.

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

/// Which response fires the remote config callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteConfigSource {
    /// Fire from the remote config response.
    RemoteConfig,
    /// Fire from the bootstrap flags reload.
    Flags,
    /// Do not fire this cycle.
    Suppressed,
}

impl RemoteConfigSource {
    /// Decide from the remote config outcome. `None` means the request
    /// failed.
    pub fn decide(config: Option<&Value>, preload_feature_flags: bool) -> Self {
        match config {
            None => RemoteConfigSource::Suppressed,
            Some(config) if preload_feature_flags && has_feature_flags(config) => {
                RemoteConfigSource::Flags
            }
            Some(_) => RemoteConfigSource::RemoteConfig,
        }
    }
}

/// Whether the project has any flags. An absent marker counts as yes.
pub fn has_feature_flags(config: &Value) -> bool {
    config
        .get("hasFeatureFlags")
        .and_then(Value::as_bool)
        .unwrap_or(true)
}

/// Why a flags reload was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadTrigger {
    /// Requested through the public API.
    User,
    /// Started by the client itself, e.g. after an identity change.
    Internal,
    /// The reload the remote config asked for during bootstrap.
    Bootstrap,
}

/// One-shot latch guarding the remote config callback.
#[derive(Debug, Default)]
pub struct RemoteConfigLatch {
    fired: AtomicBool,
    pending: AtomicBool,
}

impl RemoteConfigLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` exactly once.
    pub fn try_fire(&self) -> bool {
        self.fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Let the next applied non-user flags response fire the callback.
    pub fn defer(&self) {
        if !self.has_fired() {
            self.pending.store(true, Ordering::SeqCst);
        }
    }

    /// Clear a deferred firing, returning whether one was set.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decide() {
        let with_flags = json!({"hasFeatureFlags": true});
        let without_flags = json!({"hasFeatureFlags": false});

        assert_eq!(
            RemoteConfigSource::decide(Some(&with_flags), true),
            RemoteConfigSource::Flags
        );
        assert_eq!(
            RemoteConfigSource::decide(Some(&with_flags), false),
            RemoteConfigSource::RemoteConfig
        );
        assert_eq!(
            RemoteConfigSource::decide(Some(&without_flags), true),
            RemoteConfigSource::RemoteConfig
        );
        assert_eq!(
            RemoteConfigSource::decide(None, true),
            RemoteConfigSource::Suppressed
        );
    }

    #[test]
    fn test_latch_fires_once() {
        let latch = RemoteConfigLatch::new();
        assert!(latch.try_fire());
        assert!(!latch.try_fire());
        assert!(latch.has_fired());
    }

    #[test]
    fn test_latch_defer() {
        let latch = RemoteConfigLatch::new();
        latch.defer();
        assert!(latch.take_pending());
        assert!(!latch.take_pending());

        assert!(latch.try_fire());
        latch.defer();
        assert!(!latch.take_pending());
    }
}
