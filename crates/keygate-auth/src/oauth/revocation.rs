//! Token revocation types (RFC 7009).

use serde::{Deserialize, Serialize};

/// Token revocation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationRequest {
    /// The token to revoke.
    pub token: String,

    /// Where to look first. Both stores are searched regardless.
    #[serde(default)]
    pub token_type_hint: Option<TokenTypeHint>,

    pub client_id: String,

    #[serde(default)]
    pub client_secret: Option<String>,
}

impl RevocationRequest {
    /// Creates a revocation request without a hint.
    #[must_use]
    pub fn new(token: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            token_type_hint: None,
            client_id: client_id.into(),
            client_secret: None,
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the token type hint.
    #[must_use]
    pub fn with_hint(mut self, hint: TokenTypeHint) -> Self {
        self.token_type_hint = Some(hint);
        self
    }
}

/// Token type hint for revocation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenTypeHint {
    /// The token is an access token.
    AccessToken,
    /// The token is a refresh token.
    RefreshToken,
}

impl TokenTypeHint {
    /// Returns the token type hint as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl std::fmt::Display for TokenTypeHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_deserialize() {
        let json = r#"{"token":"t","token_type_hint":"refresh_token","client_id":"c1"}"#;
        let req: RevocationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.token_type_hint, Some(TokenTypeHint::RefreshToken));
        assert!(req.client_secret.is_none());
    }
}
