//! Passive notifications about what the client is doing.

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::broadcast;

use crate::error::{ErrorSanitizationConfig, PostHogError};
use crate::types::{EventEnvelope, FlagValue};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// An envelope was appended to the queue.
    Capture(EventEnvelope),
    /// A flush cycle delivered these envelopes.
    Flush(Vec<EventEnvelope>),
    /// A delivery or flag request failed. Messages are sanitized.
    Error(PostHogError),
    /// Flag values changed after a successful flags load.
    FeatureFlags(HashMap<String, FlagValue>),
    /// The remote configuration was applied.
    RemoteConfig(Value),
}

pub struct EventBus {
    tx: broadcast::Sender<CoreEvent>,
    sanitization: ErrorSanitizationConfig,
}

impl EventBus {
    pub fn new(sanitization: ErrorSanitizationConfig) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx, sanitization }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: CoreEvent) {
        let event = match event {
            CoreEvent::Error(e) => CoreEvent::Error(e.sanitized(&self.sanitization)),
            other => other,
        };
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }

    pub fn emit_error(&self, error: &PostHogError) {
        self.emit(CoreEvent::Error(error.clone()));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(ErrorSanitizationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_errors_are_sanitized() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.emit_error(&PostHogError::api(401, "bad key phc_0123456789abcdef"));

        match rx.recv().await.unwrap() {
            CoreEvent::Error(e) => {
                assert!(e.message.contains("phc_[REDACTED]"));
                assert_eq!(e.status(), Some(401));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::default();
        bus.emit(CoreEvent::Flush(Vec::new()));
    }
}
