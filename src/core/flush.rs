//! Batch delivery of queued envelopes.
//!
//! A flush cycle walks the queue head in batches of at most
//! `max_batch_size`. The queue is only mutated once a batch outcome is
//! known:
//!
//! | outcome                          | queue                 | cycle        |
//! |----------------------------------|-----------------------|--------------|
//! | 2xx                              | batch removed         | continues    |
//! | 413, batch > 1                   | untouched, size halved| resends head |
//! | 413, batch == 1                  | batch removed         | fails        |
//! | other HTTP error after retries   | batch removed         | fails        |
//! | no response after retries        | untouched             | fails        |

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::event_bus::{CoreEvent, EventBus};
use super::event_queue::EventQueue;
use crate::error::{ErrorCode, PostHogError, Result};
use crate::http::{with_retry, ApiClient, RetryConfig};
use crate::types::{now_rfc3339, EventEnvelope};

const BATCH_PATH: &str = "/batch/";
const PAYLOAD_TOO_LARGE: u16 = 413;

/// A flush cycle that any number of callers can await.
pub type FlushFuture = Shared<BoxFuture<'static, Result<()>>>;

/// Returns `true` while delivery must not happen, e.g. after opt-out.
pub type PauseCheck = Box<dyn Fn() -> bool + Send + Sync>;

#[derive(Serialize)]
struct BatchRequest<'a> {
    api_key: &'a str,
    batch: &'a [EventEnvelope],
    sent_at: String,
}

/// Settings the engine reads on every cycle.
#[derive(Debug, Clone)]
pub struct FlushSettings {
    pub flush_at: usize,
    pub max_batch_size: usize,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

pub struct FlushEngine {
    api: ApiClient,
    queue: Arc<EventQueue>,
    bus: Arc<EventBus>,
    retry: RetryConfig,
    request_timeout: Duration,
    flush_at: usize,
    max_batch_size: AtomicUsize,
    in_flight: Mutex<Option<FlushFuture>>,
    paused: PauseCheck,
}

impl FlushEngine {
    pub fn new(
        api: ApiClient,
        queue: Arc<EventQueue>,
        bus: Arc<EventBus>,
        settings: FlushSettings,
    ) -> Self {
        Self {
            api,
            queue,
            bus,
            retry: settings.retry,
            request_timeout: settings.request_timeout,
            flush_at: settings.flush_at,
            max_batch_size: AtomicUsize::new(settings.max_batch_size.max(1)),
            in_flight: Mutex::new(None),
            paused: Box::new(|| false),
        }
    }

    /// Consult `paused` before every batch and before scheduling a
    /// follow-up cycle.
    pub fn with_pause_check<F>(mut self, paused: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.paused = Box::new(paused);
        self
    }

    /// Current per-request ceiling. Only ever shrinks.
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size.load(Ordering::SeqCst)
    }

    pub fn is_flushing(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Start a flush cycle, or join the one already running.
    ///
    /// The returned future must be polled for the cycle to make progress.
    pub fn flush(self: &Arc<Self>) -> FlushFuture {
        let mut in_flight = self.in_flight.lock();
        if let Some(cycle) = in_flight.as_ref() {
            tracing::debug!("Joining in-flight flush");
            return cycle.clone();
        }

        let engine = Arc::clone(self);
        let cycle = async move {
            let result = engine.run_cycle().await;
            *engine.in_flight.lock() = None;

            if result.is_ok() && !(engine.paused)() && engine.queue.len() >= engine.flush_at {
                engine.spawn_flush();
            }
            result
        }
        .boxed()
        .shared();

        *in_flight = Some(cycle.clone());
        cycle
    }

    /// Run a flush on the current tokio runtime without waiting for it.
    ///
    /// Failures are already broadcast on the event bus, so they are only
    /// logged here.
    pub fn spawn_flush(self: &Arc<Self>) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::debug!("No tokio runtime, skipping background flush");
                return;
            }
        };

        let cycle = self.flush();
        handle.spawn(async move {
            if let Err(e) = cycle.await {
                tracing::error!(error = %e, "Background flush failed");
            }
        });
    }

    async fn run_cycle(&self) -> Result<()> {
        let target = self.queue.len();
        if target == 0 {
            return Ok(());
        }
        tracing::debug!(count = target, "Flush cycle started");

        let mut sent = 0;
        while sent < target {
            if (self.paused)() {
                tracing::debug!(count = target - sent, "Delivery paused, events stay queued");
                return Ok(());
            }
            let size = self.max_batch_size().min(target - sent);
            let batch = self.queue.peek_batch(size);
            if batch.is_empty() {
                break;
            }

            match self.send_batch(&batch).await {
                Ok(()) => {
                    self.queue
                        .remove_by_uuids(batch.iter().map(|e| e.uuid.as_str()));
                    sent += batch.len();
                    tracing::debug!(count = batch.len(), "Batch delivered");
                    self.bus.emit(CoreEvent::Flush(batch));
                }
                Err(e) if e.status() == Some(PAYLOAD_TOO_LARGE) && batch.len() > 1 => {
                    let reduced = (batch.len() / 2).max(1);
                    self.max_batch_size.store(reduced, Ordering::SeqCst);
                    tracing::warn!(
                        status = PAYLOAD_TOO_LARGE,
                        count = batch.len(),
                        max_batch_size = reduced,
                        "Batch too large, reducing batch size"
                    );
                }
                Err(e) => return Err(self.fail_batch(&batch, e)),
            }
        }

        Ok(())
    }

    /// Settle a batch that could not be delivered and pick the error the
    /// cycle fails with.
    fn fail_batch(&self, batch: &[EventEnvelope], error: PostHogError) -> PostHogError {
        let error = match error.status() {
            Some(PAYLOAD_TOO_LARGE) => PostHogError::payload_too_large(PAYLOAD_TOO_LARGE),
            _ => error,
        };

        match error.code {
            ErrorCode::ConnectionError => {
                tracing::warn!(count = batch.len(), error = %error, "Delivery failed, events stay queued");
            }
            _ => {
                self.queue
                    .remove_by_uuids(batch.iter().map(|e| e.uuid.as_str()));
                tracing::warn!(
                    count = batch.len(),
                    status = error.status(),
                    error = %error,
                    "Delivery failed permanently, dropping batch"
                );
            }
        }

        self.bus.emit_error(&error);
        error
    }

    async fn send_batch(&self, batch: &[EventEnvelope]) -> Result<()> {
        let body = BatchRequest {
            api_key: self.api.api_key(),
            batch,
            sent_at: now_rfc3339(),
        };

        let outcome = with_retry(
            || self.api.post(BATCH_PATH, &body, self.request_timeout),
            &self.retry,
            |e| e.is_retryable() && e.status() != Some(PAYLOAD_TOO_LARGE),
        )
        .await;

        if outcome.result.is_err() && outcome.attempts > 1 {
            tracing::warn!(attempt = outcome.attempts, "Retries exhausted for batch");
        }
        outcome.result.map(|_| ())
    }
}
