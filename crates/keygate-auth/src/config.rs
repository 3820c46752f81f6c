//! Authorization core configuration.
//!
//! Lifetimes are expressed as humantime strings in configuration files.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth.oauth]
//! access_token_lifetime = "1h"
//! refresh_token_lifetime = "30d"
//! refresh_token_rotation = true
//!
//! [auth.rbac]
//! bootstrap_system_roles = true
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::GrantType;

/// Root configuration of the authorization core.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// OAuth 2.0 grant flow configuration.
    pub oauth: OAuthConfig,

    /// Role graph configuration.
    pub rbac: RbacConfig,
}

/// OAuth 2.0 configuration.
///
/// Controls the lifetime of every TTL-governed record and the hardening
/// options of the grant flows.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Authorization code lifetime.
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// How long a stored consent decision stays valid.
    #[serde(with = "humantime_serde")]
    pub consent_lifetime: Duration,

    /// Lifetime of OAuth `state` values issued for external logins.
    #[serde(with = "humantime_serde")]
    pub state_lifetime: Duration,

    /// Rotate refresh tokens on use.
    /// When enabled, each refresh replaces the presented refresh token.
    pub refresh_token_rotation: bool,

    /// Revoke every token minted from an authorization code when that code
    /// is presented a second time.
    pub revoke_on_code_reuse: bool,

    /// Grant types the server accepts at all.
    /// Supported: "authorization_code", "client_credentials", "refresh_token"
    pub grant_types: Vec<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authorization_code_lifetime: Duration::from_secs(600), // 10 minutes
            access_token_lifetime: Duration::from_secs(3600),      // 1 hour
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 3600), // 30 days
            consent_lifetime: Duration::from_secs(90 * 24 * 3600), // 90 days
            state_lifetime: Duration::from_secs(600),
            refresh_token_rotation: false,
            revoke_on_code_reuse: true,
            grant_types: vec![
                "authorization_code".to_string(),
                "client_credentials".to_string(),
                "refresh_token".to_string(),
            ],
        }
    }
}

impl OAuthConfig {
    /// Returns `true` if the grant type is enabled server-wide.
    #[must_use]
    pub fn is_grant_enabled(&self, grant: GrantType) -> bool {
        self.grant_types.iter().any(|g| g == grant.as_str())
    }
}

/// Role graph configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RbacConfig {
    /// Install the built-in `super_admin`, `admin`, `user` and `guest` roles.
    pub bootstrap_system_roles: bool,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            bootstrap_system_roles: true,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl From<ConfigError> for crate::AuthError {
    fn from(err: ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - Any lifetime is zero
    /// - The access token outlives the refresh token
    /// - An unknown grant type is listed
    ///
    /// Returns `ConfigError::Missing` if no grant type is enabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let oauth = &self.oauth;

        let lifetimes = [
            ("authorization_code_lifetime", oauth.authorization_code_lifetime),
            ("access_token_lifetime", oauth.access_token_lifetime),
            ("refresh_token_lifetime", oauth.refresh_token_lifetime),
            ("consent_lifetime", oauth.consent_lifetime),
            ("state_lifetime", oauth.state_lifetime),
        ];
        for (name, value) in lifetimes {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue(format!("{name} must be > 0")));
            }
        }

        if oauth.access_token_lifetime >= oauth.refresh_token_lifetime {
            return Err(ConfigError::InvalidValue(
                "access_token_lifetime must be shorter than refresh_token_lifetime".to_string(),
            ));
        }

        if oauth.grant_types.is_empty() {
            return Err(ConfigError::Missing("oauth.grant_types".to_string()));
        }

        for grant in &oauth.grant_types {
            if GrantType::parse(grant).is_none() {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid grant type: '{}'. Must be authorization_code, client_credentials, or refresh_token",
                    grant
                )));
            }
        }

        Ok(())
    }
}
