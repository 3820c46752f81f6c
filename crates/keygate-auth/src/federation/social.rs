//! Login through an external identity provider.
//!
//! 1. [`SocialLogin::begin`] issues a single-use state bound to the client
//!    and redirect URI and returns the provider URL.
//! 2. The provider redirects back with `code` and `state`.
//! 3. [`SocialLogin::complete`] consumes the state, exchanges the code and
//!    fetches the profile. Linking the identity to a local user is up to the
//!    caller.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::provider::{IdentityProviderClient, ProviderTokens};
use crate::error::{AuthError, ErrorResponse};
use crate::oauth::GrantFlowEngine;

/// Where to send the user, plus the state to expect back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginRedirect {
    pub url: String,
    pub state: String,
}

/// An authenticated external identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FederatedIdentity {
    pub provider: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// The local client the login was started for.
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_refresh_token: Option<String>,
}

/// Drives provider logins on top of the grant engine's state store.
pub struct SocialLogin {
    engine: Arc<GrantFlowEngine>,
    providers: HashMap<String, Arc<dyn IdentityProviderClient>>,
}

impl SocialLogin {
    #[must_use]
    pub fn new(engine: Arc<GrantFlowEngine>) -> Self {
        Self {
            engine,
            providers: HashMap::new(),
        }
    }

    /// Registers a provider under its [`provider_name`](IdentityProviderClient::provider_name).
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn IdentityProviderClient>) -> Self {
        self.providers
            .insert(provider.provider_name().to_string(), provider);
        self
    }

    /// Names of the registered providers, sorted.
    #[must_use]
    pub fn providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Starts a login.
    ///
    /// # Errors
    ///
    /// `invalid_request` for unknown providers or unregistered redirect URIs,
    /// `invalid_client` for unknown clients.
    pub fn begin(
        &self,
        provider: &str,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<LoginRedirect, ErrorResponse> {
        let client = self.provider(provider)?;
        let state = self
            .engine
            .create_state(client_id, redirect_uri, Some(provider), None)?;
        tracing::debug!(provider, client_id, "starting external login");
        Ok(LoginRedirect {
            url: client.authorization_url(&state, redirect_uri),
            state,
        })
    }

    /// Finishes a login.
    ///
    /// # Errors
    ///
    /// `invalid_request` for a missing, expired or replayed state or a
    /// redirect URI that differs from the one the login began with.
    /// `server_error` when the provider fails.
    pub async fn complete(
        &self,
        state: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<FederatedIdentity, ErrorResponse> {
        let Some(record) = self.engine.consume_state(state)? else {
            return Err(AuthError::invalid_request("unknown or expired state").into());
        };
        if record.redirect_uri != redirect_uri {
            return Err(AuthError::invalid_request("redirect_uri does not match the login").into());
        }
        let provider_name = record
            .provider
            .ok_or_else(|| AuthError::invalid_request("state was not issued for an external login"))?;
        let provider = self.provider(&provider_name)?;

        let tokens = provider
            .exchange_code(code, redirect_uri)
            .await
            .map_err(|e| provider_failure(&provider_name, "code exchange", &e))?;
        let profile = provider
            .user_profile(&tokens.access_token)
            .await
            .map_err(|e| provider_failure(&provider_name, "profile fetch", &e))?;

        tracing::info!(
            provider = %provider_name,
            client_id = %record.client_id,
            "completed external login"
        );

        Ok(FederatedIdentity {
            provider: provider_name,
            subject: profile.subject,
            email: profile.email.filter(|_| profile.email_verified),
            client_id: record.client_id,
            provider_refresh_token: tokens.refresh_token,
        })
    }

    /// Refreshes a provider token on behalf of a linked identity.
    ///
    /// # Errors
    ///
    /// `invalid_request` for unknown providers, `server_error` on provider
    /// failure.
    pub async fn refresh(
        &self,
        provider: &str,
        refresh_token: &str,
    ) -> Result<ProviderTokens, ErrorResponse> {
        self.provider(provider)?
            .refresh_access_token(refresh_token)
            .await
            .map_err(|e| provider_failure(provider, "token refresh", &e))
    }

    /// Revokes a provider token, e.g. when an identity is unlinked.
    ///
    /// # Errors
    ///
    /// `invalid_request` for unknown providers, `server_error` on provider
    /// failure.
    pub async fn revoke(&self, provider: &str, token: &str) -> Result<(), ErrorResponse> {
        self.provider(provider)?
            .revoke_token(token)
            .await
            .map_err(|e| provider_failure(provider, "token revocation", &e))
    }

    fn provider(&self, name: &str) -> Result<&Arc<dyn IdentityProviderClient>, ErrorResponse> {
        self.providers.get(name).ok_or_else(|| {
            AuthError::invalid_request(format!("unknown identity provider: {name}")).into()
        })
    }
}

impl std::fmt::Debug for SocialLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialLogin")
            .field("providers", &self.providers())
            .finish_non_exhaustive()
    }
}

fn provider_failure(provider: &str, step: &str, err: &AuthError) -> ErrorResponse {
    tracing::warn!(provider, step, error = %err, "identity provider call failed");
    AuthError::internal(format!("{provider} {step} failed: {err}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthResult;
    use crate::clock::{Clock, ManualClock};
    use crate::config::OAuthConfig;
    use crate::error::ErrorKind;
    use crate::federation::provider::ProviderProfile;
    use crate::registry::ClientRegistry;
    use crate::types::ClientRegistration;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use time::macros::datetime;

    #[derive(Default)]
    struct MockProvider {
        fail_exchange: bool,
        revoked: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl IdentityProviderClient for MockProvider {
        fn provider_name(&self) -> &str {
            "mock"
        }

        fn authorization_url(&self, state: &str, redirect_uri: &str) -> String {
            format!("https://idp.test/authorize?state={state}&redirect_uri={redirect_uri}")
        }

        async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> AuthResult<ProviderTokens> {
            if self.fail_exchange {
                return Err(AuthError::invalid_grant("bad code"));
            }
            Ok(ProviderTokens {
                refresh_token: Some(format!("rt-{code}")),
                ..ProviderTokens::new(format!("at-{code}"))
            })
        }

        async fn user_profile(&self, access_token: &str) -> AuthResult<ProviderProfile> {
            Ok(ProviderProfile {
                subject: format!("sub-{access_token}"),
                email: Some("u@example.com".into()),
                email_verified: true,
                name: None,
            })
        }

        async fn refresh_access_token(&self, refresh_token: &str) -> AuthResult<ProviderTokens> {
            Ok(ProviderTokens::new(format!("fresh-{refresh_token}")))
        }

        async fn revoke_token(&self, token: &str) -> AuthResult<()> {
            self.revoked.lock().push(token.to_string());
            Ok(())
        }
    }

    fn login(provider: MockProvider) -> SocialLogin {
        let clock = Arc::new(ManualClock::new(datetime!(2025-01-01 00:00 UTC)));
        let clients = Arc::new(ClientRegistry::new());
        clients
            .register(
                ClientRegistration::public("web").with_redirect_uri("https://web/cb"),
                clock.now(),
            )
            .unwrap();
        let engine = Arc::new(GrantFlowEngine::new(OAuthConfig::default(), clients, clock));
        SocialLogin::new(engine).with_provider(Arc::new(provider))
    }

    #[tokio::test]
    async fn test_full_login() {
        let social = login(MockProvider::default());
        let redirect = social.begin("mock", "web", "https://web/cb").unwrap();
        assert!(redirect.url.contains(&redirect.state));

        let identity = social
            .complete(&redirect.state, "abc", "https://web/cb")
            .await
            .unwrap();
        assert_eq!(identity.provider, "mock");
        assert_eq!(identity.subject, "sub-at-abc");
        assert_eq!(identity.client_id, "web");
        assert_eq!(identity.email.as_deref(), Some("u@example.com"));
        assert_eq!(identity.provider_refresh_token.as_deref(), Some("rt-abc"));

        let replay = social
            .complete(&redirect.state, "abc", "https://web/cb")
            .await
            .unwrap_err();
        assert_eq!(replay.error, ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_redirect_must_match() {
        let social = login(MockProvider::default());
        let redirect = social.begin("mock", "web", "https://web/cb").unwrap();
        let err = social
            .complete(&redirect.state, "abc", "https://other/cb")
            .await
            .unwrap_err();
        assert_eq!(err.error, ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_provider_failure_is_server_error() {
        let social = login(MockProvider {
            fail_exchange: true,
            ..MockProvider::default()
        });
        let redirect = social.begin("mock", "web", "https://web/cb").unwrap();
        let err = social
            .complete(&redirect.state, "abc", "https://web/cb")
            .await
            .unwrap_err();
        assert_eq!(err.error, ErrorKind::ServerError);
    }

    #[test]
    fn test_unknown_provider_and_client() {
        let social = login(MockProvider::default());
        assert_eq!(
            social.begin("nope", "web", "https://web/cb").unwrap_err().error,
            ErrorKind::InvalidRequest
        );
        assert_eq!(
            social.begin("mock", "ghost", "https://web/cb").unwrap_err().error,
            ErrorKind::InvalidClient
        );
        assert_eq!(social.providers(), ["mock"]);
    }

    #[test]
    fn test_refresh_and_revoke_passthrough() {
        let provider = Arc::new(MockProvider::default());
        let clock = Arc::new(ManualClock::new(datetime!(2025-01-01 00:00 UTC)));
        let engine = Arc::new(GrantFlowEngine::new(
            OAuthConfig::default(),
            Arc::new(ClientRegistry::new()),
            clock,
        ));
        let social = SocialLogin::new(engine).with_provider(provider.clone());

        let tokens = tokio_test::block_on(social.refresh("mock", "r1")).unwrap();
        assert_eq!(tokens.access_token, "fresh-r1");

        tokio_test::block_on(social.revoke("mock", "t1")).unwrap();
        assert_eq!(*provider.revoked.lock(), ["t1"]);
    }
}
