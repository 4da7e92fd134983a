//! Scrubbing of error messages before they leave the client.
//!
//! Delivery and flag errors are broadcast to every event bus subscriber,
//! and subscribers tend to log them verbatim. Project keys (`phc_`),
//! personal keys (`phx_`), e-mail addresses, IPv4 addresses and local file
//! paths are replaced by placeholders first.

use lazy_static::lazy_static;
use regex::Regex;

/// How broadcast error messages are scrubbed.
#[derive(Debug, Clone)]
pub struct ErrorSanitizationConfig {
    pub enabled: bool,
    /// Keep the raw message on the error, reachable through
    /// `PostHogError::original_message`.
    pub preserve_original: bool,
}

impl Default for ErrorSanitizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            preserve_original: false,
        }
    }
}

impl ErrorSanitizationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            preserve_original: false,
        }
    }

    pub fn with_preservation() -> Self {
        Self {
            enabled: true,
            preserve_original: true,
        }
    }

    /// Scrub `message` according to this config.
    ///
    /// Returns the message to expose and, when preserved, the raw one.
    pub fn apply(&self, message: &str) -> (String, Option<String>) {
        if !self.enabled {
            return (message.to_string(), None);
        }
        let original = self.preserve_original.then(|| message.to_string());
        (sanitize_message(message), original)
    }
}

struct Redaction {
    pattern: Regex,
    replacement: &'static str,
}

fn redaction(pattern: &str, replacement: &'static str) -> Redaction {
    Redaction {
        // Patterns are literals below and always compile.
        pattern: Regex::new(pattern).unwrap(),
        replacement,
    }
}

lazy_static! {
    static ref REDACTIONS: [Redaction; 6] = [
        redaction(r"phc_[a-zA-Z0-9_-]{8,}", "phc_[REDACTED]"),
        redaction(r"phx_[a-zA-Z0-9_-]{8,}", "phx_[REDACTED]"),
        redaction(r"[\w.+-]+@[\w.-]+\.\w+", "[EMAIL]"),
        redaction(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b", "[IP]"),
        // A leading slash after whitespace, so URL paths survive.
        redaction(r"(?:^|\s)/(?:[\w.-]+/)+[\w.-]+", " [PATH]"),
        redaction(r"[A-Za-z]:\\(?:[\w.-]+\\)+[\w.-]*", "[PATH]"),
    ];
}

/// Replace sensitive fragments of `message` with placeholders.
///
/// ```
/// use posthog_core::error::sanitizer::sanitize_message;
///
/// let sanitized = sanitize_message("Rejected key phc_abc123xyz789 from 192.168.1.1");
/// assert_eq!(sanitized, "Rejected key phc_[REDACTED] from [IP]");
/// ```
pub fn sanitize_message(message: &str) -> String {
    let scrubbed = REDACTIONS.iter().fold(message.to_string(), |text, r| {
        r.pattern.replace_all(&text, r.replacement).into_owned()
    });
    scrubbed.trim_start().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redactions() {
        let cases = [
            ("Invalid token phc_abc123xyz789def", "Invalid token phc_[REDACTED]"),
            ("Personal key phx_personal_key_1234 rejected", "Personal key phx_[REDACTED] rejected"),
            ("Short key: phc_abc", "Short key: phc_abc"),
            ("distinct id was admin@example.com", "distinct id was [EMAIL]"),
            ("Connection refused by 192.168.1.100", "Connection refused by [IP]"),
            ("Failed to write /var/lib/app/posthog.json", "Failed to write [PATH]"),
            ("Cannot open C:\\Users\\admin\\posthog.json", "Cannot open [PATH]"),
            (
                "Error at 10.0.0.1 with phc_testkey1234567 for user@domain.com",
                "Error at [IP] with phc_[REDACTED] for [EMAIL]",
            ),
        ];
        for (input, expected) in cases {
            assert_eq!(sanitize_message(input), expected, "input: {input}");
        }
    }

    #[test]
    fn test_url_path_is_kept() {
        let message = "POST https://us.i.posthog.com/batch/ returned 500";
        assert_eq!(sanitize_message(message), message);
    }

    #[test]
    fn test_apply_respects_config() {
        let raw = "Error at 192.168.1.1";

        assert_eq!(
            ErrorSanitizationConfig::disabled().apply(raw),
            (raw.to_string(), None)
        );
        assert_eq!(
            ErrorSanitizationConfig::default().apply(raw),
            ("Error at [IP]".to_string(), None)
        );
        assert_eq!(
            ErrorSanitizationConfig::with_preservation().apply(raw),
            ("Error at [IP]".to_string(), Some(raw.to_string()))
        );
    }
}
