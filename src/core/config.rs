use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{PostHogError, Result};
use crate::http::RetryConfig;
use crate::types::FlagValue;

pub const DEFAULT_HOST: &str = "https://us.i.posthog.com";
pub const DEFAULT_FLUSH_AT: usize = 20;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;
pub const DEFAULT_FETCH_RETRY_COUNT: u32 = 3;
pub const DEFAULT_FETCH_RETRY_DELAY: Duration = Duration::from_millis(3000);
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_FEATURE_FLAGS_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SESSION_EXPIRATION: Duration = Duration::from_secs(30 * 60);

/// State seeded at construction without touching the network.
#[derive(Debug, Clone, Default)]
pub struct BootstrapConfig {
    pub distinct_id: Option<String>,
    pub is_identified_id: bool,
    pub feature_flags: HashMap<String, FlagValue>,
    pub feature_flag_payloads: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct PostHogOptions {
    pub api_key: String,
    pub host: String,
    /// Queue length that triggers a background flush.
    pub flush_at: usize,
    pub flush_interval: Duration,
    /// Hard ceiling on events per request. Shrinks on HTTP 413.
    pub max_batch_size: usize,
    pub max_queue_size: usize,
    pub fetch_retry_count: u32,
    pub fetch_retry_delay: Duration,
    pub max_retry_delay: Duration,
    pub request_timeout: Duration,
    pub feature_flags_request_timeout: Duration,
    pub preload_feature_flags: bool,
    pub disable_remote_config: bool,
    pub send_feature_flags_with_events: bool,
    pub send_feature_flag_event: bool,
    pub session_expiration: Duration,
    pub default_opt_in: bool,
    pub disabled: bool,
    pub bootstrap: Option<BootstrapConfig>,
}

impl PostHogOptions {
    pub fn new(api_key: impl Into<String>) -> Self {
        PostHogOptionsBuilder::new(api_key).build()
    }

    pub fn builder(api_key: impl Into<String>) -> PostHogOptionsBuilder {
        PostHogOptionsBuilder::new(api_key)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(PostHogError::config("API key is required"));
        }

        if !(self.host.starts_with("http://") || self.host.starts_with("https://")) {
            return Err(PostHogError::config(format!(
                "Host must be an http(s) URL, got '{}'",
                self.host
            )));
        }

        if self.flush_at == 0 {
            return Err(PostHogError::config("flush_at must be at least 1"));
        }

        if self.max_batch_size == 0 {
            return Err(PostHogError::config("max_batch_size must be at least 1"));
        }

        if self.max_queue_size == 0 {
            return Err(PostHogError::config("max_queue_size must be at least 1"));
        }

        Ok(())
    }

    /// Retry policy for batch delivery.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::builder()
            .max_retries(self.fetch_retry_count)
            .base_delay(self.fetch_retry_delay)
            .max_delay(self.max_retry_delay)
            .jitter(self.fetch_retry_delay / 10)
            .build()
    }
}

pub struct PostHogOptionsBuilder {
    api_key: String,
    host: String,
    flush_at: usize,
    flush_interval: Duration,
    max_batch_size: usize,
    max_queue_size: usize,
    fetch_retry_count: u32,
    fetch_retry_delay: Duration,
    max_retry_delay: Duration,
    request_timeout: Duration,
    feature_flags_request_timeout: Duration,
    preload_feature_flags: bool,
    disable_remote_config: bool,
    send_feature_flags_with_events: bool,
    send_feature_flag_event: bool,
    session_expiration: Duration,
    default_opt_in: bool,
    disabled: bool,
    bootstrap: Option<BootstrapConfig>,
}

impl PostHogOptionsBuilder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            host: DEFAULT_HOST.to_string(),
            flush_at: DEFAULT_FLUSH_AT,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            fetch_retry_count: DEFAULT_FETCH_RETRY_COUNT,
            fetch_retry_delay: DEFAULT_FETCH_RETRY_DELAY,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            feature_flags_request_timeout: DEFAULT_FEATURE_FLAGS_REQUEST_TIMEOUT,
            preload_feature_flags: true,
            disable_remote_config: false,
            send_feature_flags_with_events: true,
            send_feature_flag_event: true,
            session_expiration: DEFAULT_SESSION_EXPIRATION,
            default_opt_in: true,
            disabled: false,
            bootstrap: None,
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into().trim_end_matches('/').to_string();
        self
    }

    pub fn flush_at(mut self, flush_at: usize) -> Self {
        self.flush_at = flush_at;
        self
    }

    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    pub fn fetch_retry_count(mut self, count: u32) -> Self {
        self.fetch_retry_count = count;
        self
    }

    pub fn fetch_retry_delay(mut self, delay: Duration) -> Self {
        self.fetch_retry_delay = delay;
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn feature_flags_request_timeout(mut self, timeout: Duration) -> Self {
        self.feature_flags_request_timeout = timeout;
        self
    }

    pub fn preload_feature_flags(mut self, preload: bool) -> Self {
        self.preload_feature_flags = preload;
        self
    }

    pub fn disable_remote_config(mut self, disable: bool) -> Self {
        self.disable_remote_config = disable;
        self
    }

    pub fn send_feature_flags_with_events(mut self, send: bool) -> Self {
        self.send_feature_flags_with_events = send;
        self
    }

    pub fn send_feature_flag_event(mut self, send: bool) -> Self {
        self.send_feature_flag_event = send;
        self
    }

    pub fn session_expiration(mut self, expiration: Duration) -> Self {
        self.session_expiration = expiration;
        self
    }

    pub fn default_opt_in(mut self, opt_in: bool) -> Self {
        self.default_opt_in = opt_in;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn bootstrap(mut self, bootstrap: BootstrapConfig) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }

    pub fn build(self) -> PostHogOptions {
        PostHogOptions {
            api_key: self.api_key,
            host: self.host,
            flush_at: self.flush_at,
            flush_interval: self.flush_interval,
            max_batch_size: self.max_batch_size,
            max_queue_size: self.max_queue_size,
            fetch_retry_count: self.fetch_retry_count,
            fetch_retry_delay: self.fetch_retry_delay,
            max_retry_delay: self.max_retry_delay,
            request_timeout: self.request_timeout,
            feature_flags_request_timeout: self.feature_flags_request_timeout,
            preload_feature_flags: self.preload_feature_flags,
            disable_remote_config: self.disable_remote_config,
            send_feature_flags_with_events: self.send_feature_flags_with_events,
            send_feature_flag_event: self.send_feature_flag_event,
            session_expiration: self.session_expiration,
            default_opt_in: self.default_opt_in,
            disabled: self.disabled,
            bootstrap: self.bootstrap,
        }
    }
}
