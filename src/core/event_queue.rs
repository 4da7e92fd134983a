//! Ordered, persisted buffer of envelopes awaiting delivery.
//!
//! The in-memory list is mirrored to the `queue` key after every mutation,
//! so envelopes captured before a crash are delivered by the next process
//! that opens the same store.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::storage::{PersistedStore, PersistedStoreExt, PersistenceKey};
use crate::types::EventEnvelope;

pub struct EventQueue {
    store: Arc<dyn PersistedStore>,
    events: Mutex<Vec<EventEnvelope>>,
    max_queue_size: usize,
}

impl EventQueue {
    /// Open the queue, restoring anything persisted by a previous process.
    pub fn new(store: Arc<dyn PersistedStore>, max_queue_size: usize) -> Self {
        let mut events: Vec<EventEnvelope> =
            store.get_json(PersistenceKey::Queue).unwrap_or_default();

        if events.len() > max_queue_size {
            let excess = events.len() - max_queue_size;
            events.drain(..excess);
            tracing::warn!(count = excess, "Restored queue exceeds max size, dropping oldest events");
        }
        if !events.is_empty() {
            tracing::debug!(count = events.len(), "Restored persisted events");
        }

        Self {
            store,
            events: Mutex::new(events),
            max_queue_size,
        }
    }

    /// Append an envelope and return the new queue length.
    ///
    /// When the queue is full the oldest envelope is dropped first.
    pub fn enqueue(&self, envelope: EventEnvelope) -> usize {
        let mut events = self.events.lock();

        if events.len() >= self.max_queue_size {
            let dropped = events.remove(0);
            tracing::warn!(
                event = %dropped.event,
                uuid = %dropped.uuid,
                "Event queue full, dropping oldest event"
            );
        }

        events.push(envelope);
        self.persist(&events);
        events.len()
    }

    /// Copy up to `max` envelopes from the head without removing them.
    pub fn peek_batch(&self, max: usize) -> Vec<EventEnvelope> {
        let events = self.events.lock();
        events.iter().take(max).cloned().collect()
    }

    /// Remove exactly the envelopes whose uuid is in `uuids`.
    ///
    /// Envelopes appended since the batch was peeked are untouched.
    pub fn remove_by_uuids<'a, I>(&self, uuids: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let uuids: HashSet<&str> = uuids.into_iter().collect();
        if uuids.is_empty() {
            return 0;
        }

        let mut events = self.events.lock();
        let before = events.len();
        events.retain(|e| !uuids.contains(e.uuid.as_str()));
        let removed = before - events.len();
        if removed > 0 {
            self.persist(&events);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Snapshot of every queued envelope, oldest first.
    pub fn events(&self) -> Vec<EventEnvelope> {
        self.events.lock().clone()
    }

    /// Discard every queued envelope without sending.
    pub fn clear(&self) {
        let mut events = self.events.lock();
        events.clear();
        self.persist(&events);
    }

    fn persist(&self, events: &[EventEnvelope]) {
        self.store.set_json(PersistenceKey::Queue, &events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::{EventType, Properties};

    fn envelope(name: &str) -> EventEnvelope {
        EventEnvelope::new(EventType::Capture, name, "user-1", Properties::new())
    }

    fn queue(max: usize) -> (EventQueue, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (EventQueue::new(store.clone(), max), store)
    }

    #[test]
    fn test_enqueue_and_peek_preserve_order() {
        let (queue, _) = queue(10);
        queue.enqueue(envelope("a"));
        queue.enqueue(envelope("b"));
        queue.enqueue(envelope("c"));

        let batch = queue.peek_batch(2);
        let names: Vec<_> = batch.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_remove_by_uuid_leaves_newer_events() {
        let (queue, _) = queue(10);
        queue.enqueue(envelope("a"));
        queue.enqueue(envelope("b"));
        let batch = queue.peek_batch(2);

        queue.enqueue(envelope("late"));
        let removed = queue.remove_by_uuids(batch.iter().map(|e| e.uuid.as_str()));

        assert_eq!(removed, 2);
        let remaining = queue.events();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].event, "late");
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let (queue, _) = queue(2);
        queue.enqueue(envelope("a"));
        queue.enqueue(envelope("b"));
        let len = queue.enqueue(envelope("c"));

        assert_eq!(len, 2);
        let names: Vec<_> = queue.events().into_iter().map(|e| e.event).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_queue_is_restored_from_store() {
        let store = Arc::new(MemoryStore::new());
        {
            let queue = EventQueue::new(store.clone(), 10);
            queue.enqueue(envelope("persisted"));
        }

        let reopened = EventQueue::new(store, 10);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.events()[0].event, "persisted");
    }

    #[test]
    fn test_clear_persists_empty_queue() {
        let (queue, store) = queue(10);
        queue.enqueue(envelope("a"));
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(store.get_item("queue").as_deref(), Some("[]"));
    }
}
