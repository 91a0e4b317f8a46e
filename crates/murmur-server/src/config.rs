//! Relay runtime configuration.

use std::time::Duration;

use serde::Deserialize;

use murmur_core::constants::{IDLE_READ_TIMEOUT_SECS, MAX_LINE_BYTES};
use murmur_moderation::Thumbnails;

/// Configuration for both relay surfaces plus the moderation backends.
///
/// Loaded from a JSON file and overridable field-by-field from the
/// command line; every field has a serviceable default so an empty file
/// (or none at all) yields a working local relay.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address for the HTTP gateway.
    pub http_bind: String,
    /// Bind address for the line-oriented session listener.
    pub session_bind: String,
    /// Base URL of the classifier service, no trailing slash.
    pub classifier_url: String,
    /// Operator webhook for moderation notices. `None` disables them.
    pub webhook_url: Option<String>,
    /// Icon shown next to webhook notices.
    pub icon_url: Option<String>,
    /// Per-verdict thumbnail URLs attached to webhook notices.
    pub thumbnails: Thumbnails,
    /// Seconds a session may stay silent before it is closed.
    pub idle_timeout_secs: u64,
    /// Line-length cap in bytes; longer input is split at the cap.
    pub max_line_bytes: usize,
    /// Extra lexicon entries replacing the built-in word list. Empty
    /// keeps the default list.
    pub lexicon_words: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind: "127.0.0.1:18000".to_owned(),
            session_bind: "127.0.0.1:18001".to_owned(),
            classifier_url: "http://127.0.0.1:8091".to_owned(),
            webhook_url: None,
            icon_url: None,
            thumbnails: Thumbnails::default(),
            idle_timeout_secs: IDLE_READ_TIMEOUT_SECS,
            max_line_bytes: MAX_LINE_BYTES,
            lexicon_words: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Idle-read timeout as a [`Duration`].
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.http_bind, "127.0.0.1:18000");
        assert_eq!(config.idle_timeout_secs, 60);
        assert_eq!(config.max_line_bytes, 1024);
        assert!(config.webhook_url.is_none());
        assert!(config.lexicon_words.is_empty());
    }

    #[test]
    fn partial_override_keeps_the_rest() {
        let config: ServerConfig = serde_json::from_str(
            r#"{ "session_bind": "0.0.0.0:9000", "idle_timeout_secs": 5 }"#,
        )
        .unwrap();
        assert_eq!(config.session_bind, "0.0.0.0:9000");
        assert_eq!(config.idle_timeout(), Duration::from_secs(5));
        assert_eq!(config.http_bind, "127.0.0.1:18000");
    }

    #[test]
    fn thumbnails_parse_per_verdict() {
        let config: ServerConfig = serde_json::from_str(
            r#"{ "thumbnails": { "blocked": "http://x/blocked.png" } }"#,
        )
        .unwrap();
        assert_eq!(
            config.thumbnails.blocked.as_deref(),
            Some("http://x/blocked.png")
        );
        assert!(config.thumbnails.relayed.is_none());
        assert!(config.thumbnails.unscored.is_none());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<ServerConfig>(r#"{ "htpt_bind": "x" }"#);
        assert!(result.is_err());
    }
}
