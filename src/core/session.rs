use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::storage::{PersistedStore, PersistedStoreExt, PersistenceKey};

/// Tracks `$session_id`, rotating it after a period of inactivity.
pub struct SessionManager {
    store: Arc<dyn PersistedStore>,
    expiration: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn PersistedStore>, expiration: Duration) -> Self {
        Self { store, expiration }
    }

    /// The active session id, touching its activity timestamp.
    pub fn get_session_id(&self) -> String {
        self.session_id_at(Utc::now().timestamp_millis())
    }

    pub(crate) fn session_id_at(&self, now_ms: i64) -> String {
        let current = self.store.get_json::<String>(PersistenceKey::SessionId);
        let last = self
            .store
            .get_json::<i64>(PersistenceKey::SessionLastTimestamp)
            .unwrap_or(0);
        let expired = now_ms.saturating_sub(last) > self.expiration.as_millis() as i64;

        let session_id = match current {
            Some(id) if !expired => id,
            _ => {
                let id = Uuid::now_v7().to_string();
                self.store.set_json(PersistenceKey::SessionId, &id);
                tracing::debug!(session_id = %id, "Started new session");
                id
            }
        };

        self.store
            .set_json(PersistenceKey::SessionLastTimestamp, &now_ms);
        session_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn sessions() -> SessionManager {
        SessionManager::new(Arc::new(MemoryStore::new()), Duration::from_secs(60))
    }

    #[test]
    fn test_session_is_reused_while_active() {
        let sessions = sessions();
        let first = sessions.session_id_at(1_000_000);
        assert_eq!(sessions.session_id_at(1_030_000), first);
        assert_eq!(sessions.session_id_at(1_080_000), first);
    }

    #[test]
    fn test_session_rotates_after_idle_timeout() {
        let sessions = sessions();
        let first = sessions.session_id_at(1_000_000);
        assert_ne!(sessions.session_id_at(1_061_000), first);
    }

    #[test]
    fn test_cleared_session_starts_fresh() {
        let store = Arc::new(MemoryStore::new());
        let sessions = SessionManager::new(store.clone(), Duration::from_secs(60));
        let first = sessions.session_id_at(1_000_000);
        store.remove_item("session_id");
        assert_ne!(sessions.session_id_at(1_000_001), first);
    }
}
