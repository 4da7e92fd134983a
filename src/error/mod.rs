use std::sync::Arc;
use thiserror::Error;

pub mod sanitizer;

pub use sanitizer::{sanitize_message, ErrorSanitizationConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The transport produced no HTTP response.
    ConnectionError,
    /// The server answered with a non-success status.
    ApiError,
    /// The caller passed input the client cannot act on.
    ValidationError,
    /// The server rejected a single-event batch as too large.
    PayloadTooLargeTerminal,
    ConfigError,
    StorageError,
    SerializationError,
    ClientShutdown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConnectionError => "connection_error",
            ErrorCode::ApiError => "api_error",
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::PayloadTooLargeTerminal => "payload_too_large_terminal",
            ErrorCode::ConfigError => "config_error",
            ErrorCode::StorageError => "storage_error",
            ErrorCode::SerializationError => "serialization_error",
            ErrorCode::ClientShutdown => "client_shutdown",
        }
    }

    /// Whether a request that failed with this code may be sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::ConnectionError | ErrorCode::ApiError)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug, Clone)]
#[error("[{code}] {message}")]
pub struct PostHogError {
    pub code: ErrorCode,
    pub message: String,
    /// HTTP status for `api_error` and `payload_too_large_terminal`.
    pub status: Option<u16>,
    original_message: Option<String>,
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl PostHogError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            original_message: None,
            source: None,
        }
    }

    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            original_message: None,
            source: Some(Arc::new(source)),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConnectionError, message)
    }

    pub fn api(status: u16, body: &str) -> Self {
        let mut error = Self::new(
            ErrorCode::ApiError,
            format!("HTTP error while fetching PostHog: status={status}, body={body}"),
        );
        error.status = Some(status);
        error
    }

    pub fn payload_too_large(status: u16) -> Self {
        let mut error = Self::new(
            ErrorCode::PayloadTooLargeTerminal,
            "a single event exceeds the server's request size limit",
        );
        error.status = Some(status);
        error
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    pub fn client_shutdown() -> Self {
        Self::new(ErrorCode::ClientShutdown, "client has been shut down")
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Get the original unsanitized message if it was preserved.
    pub fn original_message(&self) -> Option<&str> {
        self.original_message.as_deref()
    }

    /// Create a sanitized copy of this error, suitable for broadcasting.
    pub fn sanitized(&self, config: &ErrorSanitizationConfig) -> Self {
        let (message, original_message) = config.apply(&self.message);
        Self {
            code: self.code,
            message,
            status: self.status,
            original_message,
            source: self.source.clone(),
        }
    }
}

impl From<serde_json::Error> for PostHogError {
    fn from(error: serde_json::Error) -> Self {
        Self::with_source(
            ErrorCode::SerializationError,
            format!("Failed to (de)serialize JSON: {error}"),
            error,
        )
    }
}

pub type Result<T> = std::result::Result<T, PostHogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_carries_status() {
        let error = PostHogError::api(502, "bad gateway");
        assert_eq!(error.code, ErrorCode::ApiError);
        assert_eq!(error.status(), Some(502));
        assert!(error.message.contains("status=502"));
    }

    #[test]
    fn test_display_includes_code() {
        let error = PostHogError::validation("distinct id must not be empty");
        assert_eq!(
            error.to_string(),
            "[validation_error] distinct id must not be empty"
        );
    }

    #[test]
    fn test_sanitized_copy_keeps_code_and_status() {
        let error = PostHogError::api(401, "invalid token phc_secret123456789");
        let sanitized = error.sanitized(&ErrorSanitizationConfig::default());
        assert_eq!(sanitized.code, ErrorCode::ApiError);
        assert_eq!(sanitized.status(), Some(401));
        assert!(sanitized.message.contains("phc_[REDACTED]"));
        assert!(error.message.contains("phc_secret123456789"));
    }

    #[test]
    fn test_sanitized_copy_with_preservation() {
        let error = PostHogError::connection("refused by 10.0.0.1");
        let sanitized = error.sanitized(&ErrorSanitizationConfig::with_preservation());
        assert_eq!(sanitized.message, "refused by [IP]");
        assert_eq!(sanitized.original_message(), Some("refused by 10.0.0.1"));
    }

    #[test]
    fn test_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let error = PostHogError::with_source(ErrorCode::StorageError, "write failed", source);
        assert!(std::error::Error::source(&error).is_some());
        let cloned = error.clone();
        assert!(cloned.source.is_some());
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let error: PostHogError = parse.unwrap_err().into();
        assert_eq!(error.code, ErrorCode::SerializationError);
    }
}
