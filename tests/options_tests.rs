use posthog_core::core::{
    DEFAULT_FLUSH_AT, DEFAULT_FLUSH_INTERVAL, DEFAULT_HOST, DEFAULT_MAX_BATCH_SIZE,
    DEFAULT_MAX_QUEUE_SIZE,
};
use posthog_core::{BootstrapConfig, ErrorCode, PostHogOptions};
use std::time::Duration;

#[test]
fn test_default_values() {
    let options = PostHogOptions::new("phc_test_key");

    assert_eq!(options.api_key, "phc_test_key");
    assert_eq!(options.host, DEFAULT_HOST);
    assert_eq!(options.flush_at, DEFAULT_FLUSH_AT);
    assert_eq!(options.flush_interval, DEFAULT_FLUSH_INTERVAL);
    assert_eq!(options.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
    assert_eq!(options.max_queue_size, DEFAULT_MAX_QUEUE_SIZE);
    assert_eq!(options.fetch_retry_count, 3);
    assert_eq!(options.fetch_retry_delay, Duration::from_millis(3000));
    assert_eq!(options.request_timeout, Duration::from_secs(10));
    assert_eq!(options.session_expiration, Duration::from_secs(1800));
    assert!(options.preload_feature_flags);
    assert!(!options.disable_remote_config);
    assert!(options.send_feature_flags_with_events);
    assert!(options.send_feature_flag_event);
    assert!(options.default_opt_in);
    assert!(!options.disabled);
    assert!(options.bootstrap.is_none());
}

#[test]
fn test_builder_custom_values() {
    let options = PostHogOptions::builder("phc_test_key")
        .host("https://eu.i.posthog.com/")
        .flush_at(50)
        .flush_interval(Duration::from_secs(60))
        .max_batch_size(25)
        .max_queue_size(500)
        .fetch_retry_count(5)
        .fetch_retry_delay(Duration::from_millis(100))
        .request_timeout(Duration::from_secs(30))
        .preload_feature_flags(false)
        .disable_remote_config(true)
        .send_feature_flag_event(false)
        .default_opt_in(false)
        .bootstrap(BootstrapConfig {
            distinct_id: Some("user-1".to_string()),
            ..Default::default()
        })
        .build();

    assert_eq!(options.host, "https://eu.i.posthog.com");
    assert_eq!(options.flush_at, 50);
    assert_eq!(options.flush_interval, Duration::from_secs(60));
    assert_eq!(options.max_batch_size, 25);
    assert_eq!(options.max_queue_size, 500);
    assert_eq!(options.fetch_retry_count, 5);
    assert_eq!(options.fetch_retry_delay, Duration::from_millis(100));
    assert_eq!(options.request_timeout, Duration::from_secs(30));
    assert!(!options.preload_feature_flags);
    assert!(options.disable_remote_config);
    assert!(!options.send_feature_flag_event);
    assert!(!options.default_opt_in);
    assert_eq!(
        options.bootstrap.unwrap().distinct_id.as_deref(),
        Some("user-1")
    );
}

#[test]
fn test_validate_accepts_defaults() {
    assert!(PostHogOptions::new("phc_test_key").validate().is_ok());
}

#[test]
fn test_validate_rejects_empty_api_key() {
    let err = PostHogOptions::new("  ").validate().unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigError);
}

#[test]
fn test_validate_rejects_bad_host() {
    let options = PostHogOptions::builder("phc_test_key")
        .host("us.i.posthog.com")
        .build();
    assert_eq!(options.validate().unwrap_err().code, ErrorCode::ConfigError);
}

#[test]
fn test_validate_rejects_zero_sizes() {
    for options in [
        PostHogOptions::builder("phc_test_key").flush_at(0).build(),
        PostHogOptions::builder("phc_test_key").max_batch_size(0).build(),
        PostHogOptions::builder("phc_test_key").max_queue_size(0).build(),
    ] {
        assert!(options.validate().is_err());
    }
}

#[test]
fn test_retry_config_follows_options() {
    let options = PostHogOptions::builder("phc_test_key")
        .fetch_retry_count(2)
        .fetch_retry_delay(Duration::from_millis(200))
        .max_retry_delay(Duration::from_secs(1))
        .build();

    let retry = options.retry_config();
    assert_eq!(retry.max_retries, 2);
    assert_eq!(retry.base_delay, Duration::from_millis(200));
    assert_eq!(retry.max_delay, Duration::from_secs(1));
}
