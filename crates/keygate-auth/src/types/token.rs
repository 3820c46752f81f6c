//! Credential records kept in the TTL stores.
//!
//! Every credential is indexed by the SHA-256 of its value. The plaintext is
//! handed to the client once and never stored.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use super::Scopes;
use crate::oauth::PkceMethod;

/// Generate a cryptographically secure random credential value.
///
/// Returns a 256-bit random value encoded as base64url (43 characters).
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a credential value using SHA-256.
///
/// Used both when storing new credentials and when looking them up.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// A one-time authorization code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// SHA-256 of the code value.
    pub code_hash: String,
    pub client_id: String,
    pub user_id: String,
    /// Redirect URI the code was issued for; the exchange must repeat it.
    pub redirect_uri: String,
    pub scopes: Scopes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<PkceMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Flips to `true` on the first exchange whose binding checks pass and
    /// never flips back.
    pub used: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// A bearer access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// SHA-256 of the token value.
    pub token_hash: String,
    pub client_id: String,
    /// Absent for client-credentials tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub scopes: Scopes,
    /// Refresh token this access token was minted with or from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_hash: Option<String>,
    /// Hash of the authorization code the token descends from. Absent for
    /// client-credentials tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl AccessToken {
    /// Seconds of validity left at `now`, never negative.
    #[must_use]
    pub fn expires_in(&self, now: OffsetDateTime) -> i64 {
        (self.expires_at - now).whole_seconds().max(0)
    }
}

/// A refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    /// SHA-256 of the token value.
    pub token_hash: String,
    pub client_id: String,
    pub user_id: String,
    pub scopes: Scopes,
    /// Hash of the authorization code the token descends from. Survives
    /// rotation, so every generation of the token shares it.
    pub grant_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// A user's decision about a client's scopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentDecision {
    pub user_id: String,
    pub client_id: String,
    pub scopes: Scopes,
    pub approved: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub decided_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl ConsentDecision {
    /// Store key for a user/client pair.
    #[must_use]
    pub fn key(user_id: &str, client_id: &str) -> String {
        format!("{user_id}:{client_id}")
    }
}

/// CSRF state for an outbound login to an external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthState {
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_hash_token() {
        let hash = hash_token("test-token-value");
        // SHA-256 produces 64 hex characters
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_token("test-token-value"));
        assert_ne!(hash, hash_token("different-token"));
    }

    #[test]
    fn test_generate_token() {
        let token = generate_token();
        // 32 bytes base64url encoded = 43 characters
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_generate_token_uniqueness() {
        let mut tokens: Vec<String> = (0..100).map(|_| generate_token()).collect();
        tokens.sort();
        tokens.dedup();
        assert_eq!(tokens.len(), 100);
    }

    #[test]
    fn test_expires_in_saturates() {
        let token = AccessToken {
            token_hash: hash_token("t"),
            client_id: "c1".to_string(),
            user_id: None,
            scopes: Scopes::parse("read"),
            refresh_token_hash: None,
            grant_id: None,
            issued_at: datetime!(2025-01-01 00:00 UTC),
            expires_at: datetime!(2025-01-01 01:00 UTC),
        };
        assert_eq!(token.expires_in(datetime!(2025-01-01 00:00 UTC)), 3600);
        assert_eq!(token.expires_in(datetime!(2025-01-01 02:00 UTC)), 0);
    }

    #[test]
    fn test_consent_key() {
        assert_eq!(ConsentDecision::key("u1", "c1"), "u1:c1");
    }
}
