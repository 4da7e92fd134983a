//! The network seam.
//!
//! The engine never talks to the network directly: it builds an
//! [`HttpRequest`] and hands it to a [`Transport`]. A transport reports a
//! response for any status code and only fails when no response was
//! received at all.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{ErrorCode, PostHogError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn post(url: impl Into<String>, body: String) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body),
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Parse the request body back into JSON. Handy for test transports.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        self.body.as_deref().and_then(|b| serde_json::from_str(b).ok())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            PostHogError::with_source(
                ErrorCode::SerializationError,
                format!("Failed to parse response: {e}"),
                e,
            )
        })
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request.
    ///
    /// # Errors
    ///
    /// Returns a `connection_error` only when no HTTP response was received.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder().build().map_err(|e| {
            PostHogError::with_source(ErrorCode::ConfigError, "Failed to create HTTP client", e)
        })?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn convert_error(error: reqwest::Error) -> PostHogError {
        let message = if error.is_timeout() {
            "Request timed out".to_string()
        } else if error.is_connect() {
            "Connection failed".to_string()
        } else {
            format!("Network error while fetching PostHog: {error}")
        };
        PostHogError::with_source(ErrorCode::ConnectionError, message, error)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(Self::convert_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(Self::convert_error)?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_sets_json_content_type() {
        let request = HttpRequest::post("https://example.com/batch/", "{}".to_string());
        assert_eq!(request.method, HttpMethod::Post);
        assert!(request
            .headers
            .iter()
            .any(|(k, v)| k == "Content-Type" && v == "application/json"));
    }

    #[test]
    fn test_response_success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(413, "").is_success());
        assert!(!HttpResponse::new(500, "").is_success());
    }

    #[test]
    fn test_response_json() {
        let response = HttpResponse::new(200, r#"{"status":1}"#);
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["status"], 1);

        let bad = HttpResponse::new(200, "<html>");
        assert!(bad.json::<serde_json::Value>().is_err());
    }
}
