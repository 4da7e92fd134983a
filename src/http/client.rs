use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::transport::{HttpRequest, HttpResponse, Transport};
use crate::error::{PostHogError, Result};

pub const USER_AGENT: &str = concat!("posthog-core-rust/", env!("CARGO_PKG_VERSION"));

/// Builds PostHog requests and turns non-success statuses into errors.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    host: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, host: &str, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            host: host.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    pub async fn get(&self, path: &str, timeout: Duration) -> Result<HttpResponse> {
        let request = HttpRequest::get(self.url(path))
            .header("User-Agent", USER_AGENT)
            .timeout(timeout);
        self.execute(request).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<HttpResponse> {
        let body = serde_json::to_string(body)?;
        let request = HttpRequest::post(self.url(path), body)
            .header("User-Agent", USER_AGENT)
            .timeout(timeout);
        self.execute(request).await
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.transport.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(PostHogError::api(response.status, &response.body))
        }
    }
}
