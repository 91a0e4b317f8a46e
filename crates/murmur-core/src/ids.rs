//! Branded ID newtypes for type safety.
//!
//! Identifier strings in murmur are opaque but distinct: a stream
//! subscriber's token is not interchangeable with a session peer's
//! identifier. Each gets a newtype wrapper around `String` so the compiler
//! keeps them apart.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::constants::SUBSCRIBER_TOKEN_LEN;

/// Generate a URL-safe random token of exactly `len` characters.
#[must_use]
pub fn random_token(len: usize) -> String {
    // 3 random bytes encode to 4 base64 characters; round up, then trim.
    let mut bytes = vec![0u8; len.div_ceil(4) * 3];
    rand::rng().fill_bytes(&mut bytes);
    let mut token = URL_SAFE_NO_PAD.encode(&bytes);
    token.truncate(len);
    token
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for one broadcast subscriber.
    SubscriberId
}

branded_id! {
    /// Best-effort peer identifier reported by the session transport.
    PeerId
}

impl SubscriberId {
    /// Create a fresh random subscriber identifier (10-character token).
    #[must_use]
    pub fn random() -> Self {
        Self(random_token(SUBSCRIBER_TOKEN_LEN))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_subscriber_id_has_token_length() {
        let id = SubscriberId::random();
        assert_eq!(id.as_str().len(), SUBSCRIBER_TOKEN_LEN);
    }

    #[test]
    fn random_tokens_are_distinct() {
        let a = random_token(10);
        let b = random_token(10);
        assert_ne!(a, b);
    }

    #[test]
    fn random_token_is_url_safe() {
        let token = random_token(32);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn branded_ids_round_trip_through_string() {
        let peer = PeerId::from("curious@example.com");
        assert_eq!(peer.as_str(), "curious@example.com");
        assert_eq!(String::from(peer.clone()), "curious@example.com");
        assert_eq!(peer.to_string(), "curious@example.com");
    }
}
