//! Token endpoint types.
//!
//! One [`TokenRequest`] shape serves the `authorization_code`,
//! `client_credentials` and `refresh_token` grants; the engine dispatches on
//! `grant_type`.

use serde::{Deserialize, Serialize};

/// Token request parameters.
///
/// Different fields are required depending on the `grant_type`:
///
/// - `authorization_code`: code, redirect_uri, client_id, code_verifier if
///   the code carries a PKCE challenge
/// - `refresh_token`: refresh_token, client_id, optional scope
/// - `client_credentials`: client_id, client_secret, optional scope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRequest {
    /// One of: "authorization_code", "refresh_token", "client_credentials".
    pub grant_type: String,

    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub redirect_uri: Option<String>,

    #[serde(default)]
    pub code_verifier: Option<String>,

    pub client_id: String,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Requested scope; narrows a refresh, selects client-credentials scopes.
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenRequest {
    /// An `authorization_code` exchange request.
    #[must_use]
    pub fn authorization_code(
        client_id: impl Into<String>,
        code: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            grant_type: "authorization_code".to_string(),
            client_id: client_id.into(),
            code: Some(code.into()),
            redirect_uri: Some(redirect_uri.into()),
            ..Self::default()
        }
    }

    /// A `client_credentials` request.
    #[must_use]
    pub fn client_credentials(client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            grant_type: "client_credentials".to_string(),
            client_id: client_id.into(),
            client_secret: Some(secret.into()),
            ..Self::default()
        }
    }

    /// A `refresh_token` request.
    #[must_use]
    pub fn refresh(client_id: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            grant_type: "refresh_token".to_string(),
            client_id: client_id.into(),
            refresh_token: Some(refresh_token.into()),
            ..Self::default()
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the PKCE verifier.
    #[must_use]
    pub fn with_verifier(mut self, verifier: impl Into<String>) -> Self {
        self.code_verifier = Some(verifier.into());
        self
    }

    /// Sets the requested scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// Successful token response.
///
/// # Example Response
///
/// ```json
/// {
///   "access_token": "q3Fh...",
///   "token_type": "Bearer",
///   "expires_in": 3600,
///   "scope": "read",
///   "refresh_token": "Zk2p..."
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    /// Always `Bearer`.
    pub token_type: String,

    /// Seconds until the access token expires.
    pub expires_in: u64,

    pub scope: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Reserved for an OpenID Connect layer; never minted by this crate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl TokenResponse {
    #[must_use]
    pub fn new(access_token: String, expires_in: u64, scope: String) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            scope,
            refresh_token: None,
            id_token: None,
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, token: String) -> Self {
        self.refresh_token = Some(token);
        self
    }
}

/// Token introspection result (RFC 7662 subset).
///
/// Inactive tokens serialize as `{"active": false}` only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenIntrospection {
    pub active: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Subject (user id).
    #[serde(rename = "sub", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// "access_token" or "refresh_token".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Expiry as a Unix timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl TokenIntrospection {
    /// The response for unknown, expired and revoked tokens.
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }
}
