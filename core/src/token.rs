//! Redemption tokens.
//!
//! A token is 16 bytes (128 bits) from the operating system's CSPRNG, hex encoded.
//! Collisions are astronomically unlikely; storage still enforces uniqueness and
//! the ticket issuer re-mints on conflict.

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of random bytes in a token.
pub const TOKEN_BYTES: usize = 16;

/// Opaque, unguessable value encoded on a ticket and used for check-in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RedemptionToken(String);

impl RedemptionToken {
    /// Draw a fresh token from the OS random source.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Wrap a token read back from storage or a QR payload.
    #[must_use]
    pub fn from_string(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RedemptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of redemption tokens, injected so tests can force collisions.
pub trait TokenSource: Send + Sync {
    /// Produce the next token.
    fn next_token(&self) -> RedemptionToken;
}

/// Production token source backed by [`RedemptionToken::generate`].
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRngTokenSource;

impl TokenSource for OsRngTokenSource {
    fn next_token(&self) -> RedemptionToken {
        RedemptionToken::generate()
    }
}
