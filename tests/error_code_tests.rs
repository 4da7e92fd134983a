use posthog_core::{ErrorCode, ErrorSanitizationConfig, PostHogError};

#[test]
fn test_error_code_string_values() {
    assert_eq!(ErrorCode::ConnectionError.as_str(), "connection_error");
    assert_eq!(ErrorCode::ApiError.as_str(), "api_error");
    assert_eq!(ErrorCode::ValidationError.as_str(), "validation_error");
    assert_eq!(
        ErrorCode::PayloadTooLargeTerminal.as_str(),
        "payload_too_large_terminal"
    );
    assert_eq!(ErrorCode::ConfigError.as_str(), "config_error");
    assert_eq!(ErrorCode::StorageError.as_str(), "storage_error");
    assert_eq!(ErrorCode::ClientShutdown.as_str(), "client_shutdown");
}

#[test]
fn test_retryable_codes() {
    assert!(ErrorCode::ConnectionError.is_retryable());
    assert!(ErrorCode::ApiError.is_retryable());

    assert!(!ErrorCode::ValidationError.is_retryable());
    assert!(!ErrorCode::PayloadTooLargeTerminal.is_retryable());
    assert!(!ErrorCode::ConfigError.is_retryable());
    assert!(!ErrorCode::ClientShutdown.is_retryable());
}

#[test]
fn test_api_error_keeps_status_and_body() {
    let error = PostHogError::api(503, "try later");

    assert_eq!(error.code, ErrorCode::ApiError);
    assert_eq!(error.status(), Some(503));
    assert!(error.message.contains("status=503"));
    assert!(error.message.contains("try later"));
    assert!(error.to_string().starts_with("[api_error]"));
}

#[test]
fn test_payload_too_large_is_terminal() {
    let error = PostHogError::payload_too_large(413);

    assert_eq!(error.code, ErrorCode::PayloadTooLargeTerminal);
    assert_eq!(error.status(), Some(413));
    assert!(!error.is_retryable());
}

#[test]
fn test_sanitized_copy_redacts_secrets() {
    let error = PostHogError::api(401, "bad key phc_abcdefgh12345 for ops@example.com");

    let sanitized = error.sanitized(&ErrorSanitizationConfig::default());

    assert_eq!(sanitized.code, ErrorCode::ApiError);
    assert_eq!(sanitized.status(), Some(401));
    assert!(sanitized.message.contains("phc_[REDACTED]"));
    assert!(sanitized.message.contains("[EMAIL]"));
    assert!(sanitized.original_message().is_none());
}

#[test]
fn test_sanitization_can_be_disabled() {
    let error = PostHogError::connection("refused by 10.0.0.1");

    let copy = error.sanitized(&ErrorSanitizationConfig::disabled());
    assert_eq!(copy.message, error.message);

    let preserved = error.sanitized(&ErrorSanitizationConfig::with_preservation());
    assert!(preserved.message.contains("[IP]"));
    assert_eq!(preserved.original_message(), Some("refused by 10.0.0.1"));
}
