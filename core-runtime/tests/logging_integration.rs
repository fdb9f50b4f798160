//! Integration tests for the logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{
    init_logging, redact_if_sensitive, redact_url, LogFormat, LoggingConfig,
};

#[test]
fn test_logging_config_defaults() {
    let config = LoggingConfig::default();

    assert_eq!(config.level, LogLevel::Info);
    assert!(config.redact_pii);
    assert!(config.filter.is_none());
    assert!(config.logger_sink.is_none());
}

#[test]
fn test_init_logging_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    init_logging(config.clone()).expect("first initialization succeeds");
    tracing::info!(namespace = "shell-v1", "logging initialized");

    assert!(init_logging(config).is_err());
}

#[test]
fn test_redacted_urls_keep_path() {
    let redacted = redact_url("https://app.example/api/items?user=alice@example.com");
    assert_eq!(redacted, "https://app.example/api/items");
    assert!(!redacted.contains("alice"));
}

#[test]
fn test_sensitive_fields() {
    assert_eq!(redact_if_sensitive("refresh_token", "x"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("Cookie", "sid=1"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("tag", "sync-data"), "sync-data");
}
