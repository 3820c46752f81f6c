//! External identity provider client contract.
//!
//! Implementations talk to Google, GitHub and the like over HTTP. They live
//! outside this crate; the core only drives them through this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::AuthResult;

/// Tokens returned by a provider's token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTokens {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl ProviderTokens {
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_in: None,
            id_token: None,
        }
    }
}

/// The user as the provider describes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Stable subject identifier, unique per provider.
    pub subject: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default)]
    pub email_verified: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// An OAuth client for one external identity provider.
#[async_trait]
pub trait IdentityProviderClient: Send + Sync {
    /// Short name used to select the provider (e.g. "github").
    fn provider_name(&self) -> &str;

    /// The URL to send the user to.
    fn authorization_url(&self, state: &str, redirect_uri: &str) -> String;

    /// Exchanges the provider's authorization code.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the code or is unreachable.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> AuthResult<ProviderTokens>;

    /// Fetches the user's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn user_profile(&self, access_token: &str) -> AuthResult<ProviderProfile>;

    /// Refreshes a provider access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn refresh_access_token(&self, refresh_token: &str) -> AuthResult<ProviderTokens>;

    /// Revokes a provider token.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn revoke_token(&self, token: &str) -> AuthResult<()>;
}
