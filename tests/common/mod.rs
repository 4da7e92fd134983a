#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use posthog_core::{
    HttpRequest, HttpResponse, MemoryStore, PersistedStore, PostHogCore, PostHogError,
    PostHogOptions, PostHogOptionsBuilder, Result, Transport,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync>;

/// Transport that records every request and answers from a closure.
pub struct MockTransport {
    requests: Mutex<Vec<HttpRequest>>,
    handler: Handler,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            handler: Box::new(handler),
            delay: None,
        })
    }

    pub fn with_delay<F>(delay: Duration, handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            handler: Box::new(handler),
            delay: Some(delay),
        })
    }

    /// Accepts every batch and answers flags requests with no flags.
    pub fn ok() -> Arc<Self> {
        Self::new(|request| {
            if request.url.contains("/flags/") {
                Ok(HttpResponse::new(200, json!({"featureFlags": {}}).to_string()))
            } else if request.url.contains("/config") {
                Ok(HttpResponse::new(200, json!({"hasFeatureFlags": false}).to_string()))
            } else {
                Ok(HttpResponse::new(200, "{\"status\":1}"))
            }
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, fragment: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .cloned()
            .collect()
    }

    /// Event names of every batch request, in send order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.requests_to("/batch/")
            .iter()
            .map(|r| batch_events(r).iter().map(|e| e["event"].as_str().unwrap_or_default().to_string()).collect())
            .collect()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.requests_to("/batch/").iter().map(|r| batch_events(r).len()).collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(&request)
    }
}

pub fn batch_events(request: &HttpRequest) -> Vec<Value> {
    request
        .json_body()
        .and_then(|body| body["batch"].as_array().cloned())
        .unwrap_or_default()
}

pub fn json_response(status: u16, body: Value) -> Result<HttpResponse> {
    Ok(HttpResponse::new(status, body.to_string()))
}

pub fn connection_refused() -> Result<HttpResponse> {
    Err(PostHogError::connection("connection refused"))
}

/// Options with fast retries and no size-triggered flushing.
pub fn test_options() -> PostHogOptionsBuilder {
    PostHogOptions::builder("phc_test_key")
        .host("https://test.posthog.local")
        .flush_at(1000)
        .flush_interval(Duration::from_secs(3600))
        .fetch_retry_delay(Duration::from_millis(1))
        .max_retry_delay(Duration::from_millis(5))
}

pub fn client(options: PostHogOptions, transport: Arc<MockTransport>) -> (PostHogCore, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let core = PostHogCore::with_backends(options, store.clone(), transport).unwrap();
    (core, store)
}

pub fn client_on_store(
    options: PostHogOptions,
    store: Arc<dyn PersistedStore>,
    transport: Arc<MockTransport>,
) -> PostHogCore {
    PostHogCore::with_backends(options, store, transport).unwrap()
}

pub fn props(value: Value) -> posthog_core::Properties {
    value.as_object().cloned().unwrap_or_default()
}

/// Let spawned background work run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
