//! Grant flow state machines.
//!
//! [`GrantFlowEngine`] drives the authorization-code (with PKCE),
//! client-credentials and refresh-token grants on top of the
//! [`ClientRegistry`] and one [`ResourceStore`] per credential kind.
//!
//! Every public operation is total: protocol violations come back as an
//! [`ErrorResponse`] value. The clock is read once per call.

use std::sync::Arc;

use time::OffsetDateTime;

use crate::AuthResult;
use crate::clock::Clock;
use crate::config::OAuthConfig;
use crate::error::{AuthError, ErrorResponse};
use crate::oauth::authorize::{
    AuthorizationRequest, AuthorizationResponse, AuthorizeOutcome, ConsentPrompt,
};
use crate::oauth::pkce::{PkceChallenge, PkceMethod, PkceVerifier};
use crate::oauth::revocation::{RevocationRequest, TokenTypeHint};
use crate::oauth::token::{TokenIntrospection, TokenRequest, TokenResponse};
use crate::registry::ClientRegistry;
use crate::store::{MemoryStore, ResourceStore};
use crate::types::{
    AccessToken, AuthorizationCode, Client, ConsentDecision, GrantType, OAuthState,
    RefreshToken, Scopes, generate_token, hash_token,
};

// =============================================================================
// Stores
// =============================================================================

/// The five TTL namespaces used by the grant flows.
#[derive(Clone)]
pub struct GrantStores {
    pub codes: Arc<dyn ResourceStore<AuthorizationCode>>,
    pub access_tokens: Arc<dyn ResourceStore<AccessToken>>,
    pub refresh_tokens: Arc<dyn ResourceStore<RefreshToken>>,
    pub consents: Arc<dyn ResourceStore<ConsentDecision>>,
    pub states: Arc<dyn ResourceStore<OAuthState>>,
}

impl GrantStores {
    /// Fresh in-memory stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            codes: Arc::new(MemoryStore::new("authorization_codes")),
            access_tokens: Arc::new(MemoryStore::new("access_tokens")),
            refresh_tokens: Arc::new(MemoryStore::new("refresh_tokens")),
            consents: Arc::new(MemoryStore::new("consents")),
            states: Arc::new(MemoryStore::new("oauth_states")),
        }
    }
}

impl Default for GrantStores {
    fn default() -> Self {
        Self::in_memory()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// OAuth 2.0 grant flow engine.
pub struct GrantFlowEngine {
    config: OAuthConfig,
    clients: Arc<ClientRegistry>,
    clock: Arc<dyn Clock>,
    stores: GrantStores,
}

impl GrantFlowEngine {
    /// Creates an engine backed by in-memory stores.
    #[must_use]
    pub fn new(config: OAuthConfig, clients: Arc<ClientRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self::with_stores(config, clients, clock, GrantStores::in_memory())
    }

    /// Creates an engine on caller-provided stores.
    #[must_use]
    pub fn with_stores(
        config: OAuthConfig,
        clients: Arc<ClientRegistry>,
        clock: Arc<dyn Clock>,
        stores: GrantStores,
    ) -> Self {
        Self {
            config,
            clients,
            clock,
            stores,
        }
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Authorization code flow
    // -------------------------------------------------------------------------

    /// Handles an authorization request on behalf of an authenticated user.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorResponse`] carrying the request `state` when the
    /// request is rejected. A missing consent is not an error; it is reported
    /// as [`AuthorizeOutcome::ConsentRequired`].
    pub fn authorize(
        &self,
        request: &AuthorizationRequest,
        user_id: &str,
    ) -> Result<AuthorizeOutcome, ErrorResponse> {
        let now = self.clock.now();
        self.authorize_at(request, user_id, now)
            .map_err(|err| ErrorResponse::from(err).with_state(request.state.as_str()))
    }

    fn authorize_at(
        &self,
        request: &AuthorizationRequest,
        user_id: &str,
        now: OffsetDateTime,
    ) -> AuthResult<AuthorizeOutcome> {
        let client = self
            .clients
            .get(&request.client_id)
            .filter(|c| c.active)
            .ok_or_else(|| AuthError::invalid_client("unknown client"))?;

        if !client.is_redirect_uri_allowed(&request.redirect_uri) {
            return Err(AuthError::invalid_request(
                "redirect_uri is not registered for this client",
            ));
        }

        if request.response_type != "code" {
            return Err(AuthError::unsupported_response_type(
                request.response_type.as_str(),
            ));
        }

        self.ensure_grant_allowed(&client, GrantType::AuthorizationCode)?;

        let scopes = grant_scopes(&client, &Scopes::parse(&request.scope))?;

        let (code_challenge, code_challenge_method) = match request.code_challenge.as_deref() {
            Some(challenge) => {
                let method = match request.code_challenge_method.as_deref() {
                    Some(m) => PkceMethod::parse(m)?,
                    None => PkceMethod::Plain,
                };
                let challenge = PkceChallenge::new(challenge)?;
                (Some(challenge.into_inner()), Some(method))
            }
            None if request.code_challenge_method.is_some() => {
                return Err(AuthError::invalid_request(
                    "code_challenge_method given without code_challenge",
                ));
            }
            None if client.pkce_required => {
                return Err(AuthError::invalid_request(
                    "this client requires a PKCE code_challenge",
                ));
            }
            None => (None, None),
        };

        if client.needs_consent() {
            let key = ConsentDecision::key(user_id, &client.client_id);
            match self.stores.consents.get(&key, now)? {
                Some(decision) if decision.scopes.covers(&scopes) => {
                    if !decision.approved {
                        return Err(AuthError::access_denied(
                            "the user denied access to this client",
                        ));
                    }
                }
                _ => {
                    tracing::debug!(client_id = %client.client_id, user_id, "consent required");
                    return Ok(AuthorizeOutcome::ConsentRequired(ConsentPrompt {
                        client_id: client.client_id.clone(),
                        client_name: client.name.clone(),
                        user_id: user_id.to_string(),
                        scopes,
                        state: request.state.clone(),
                    }));
                }
            }
        }

        let code = generate_token();
        let record = AuthorizationCode {
            code_hash: hash_token(&code),
            client_id: client.client_id.clone(),
            user_id: user_id.to_string(),
            redirect_uri: request.redirect_uri.clone(),
            scopes,
            code_challenge,
            code_challenge_method,
            nonce: request.nonce.clone(),
            used: false,
            issued_at: now,
            expires_at: now + self.config.authorization_code_lifetime,
        };
        self.stores.codes.put(
            &record.code_hash,
            record.clone(),
            now,
            self.config.authorization_code_lifetime,
        )?;

        tracing::info!(
            client_id = %record.client_id,
            user_id,
            scope = %record.scopes,
            pkce = record.code_challenge_method.map(|m| m.as_str()).unwrap_or("none"),
            "issued authorization code"
        );

        Ok(AuthorizeOutcome::Code(AuthorizationResponse::new(
            code,
            request.state.clone(),
        )))
    }

    /// Exchanges an authorization code for an access and a refresh token.
    ///
    /// A second exchange of the same code fails with `invalid_grant` and,
    /// when `revoke_on_code_reuse` is enabled, revokes every token minted
    /// from the first exchange.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorResponse`] describing the first failed check.
    pub fn exchange_code_for_token(
        &self,
        request: &TokenRequest,
    ) -> Result<TokenResponse, ErrorResponse> {
        let now = self.clock.now();
        self.exchange_code_at(request, now).map_err(ErrorResponse::from)
    }

    fn exchange_code_at(
        &self,
        request: &TokenRequest,
        now: OffsetDateTime,
    ) -> AuthResult<TokenResponse> {
        self.expect_grant_type(request, GrantType::AuthorizationCode)?;

        let code = non_empty(request.code.as_deref())
            .ok_or_else(|| AuthError::invalid_request("code is required"))?;
        let redirect_uri = non_empty(request.redirect_uri.as_deref())
            .ok_or_else(|| AuthError::invalid_request("redirect_uri is required"))?;

        let client = self
            .clients
            .authenticate(&request.client_id, request.client_secret.as_deref())?;

        let code_hash = hash_token(code);

        // Check-and-set under the store lock: the code is marked used only if
        // it was unused and every binding check passes.
        let mut verdict: AuthResult<()> = Ok(());
        let previous = self.stores.codes.update(&code_hash, now, &mut |stored| {
            if stored.used {
                return;
            }
            verdict = check_code_binding(stored, &client.client_id, redirect_uri, request);
            stored.used = verdict.is_ok();
        })?;

        let Some(previous) = previous else {
            return Err(AuthError::invalid_grant(
                "authorization code is invalid or expired",
            ));
        };

        if previous.used {
            self.on_code_reuse(&previous)?;
            return Err(AuthError::invalid_grant(
                "authorization code has already been used",
            ));
        }
        verdict?;

        let (refresh_token, refresh_record) =
            self.store_refresh_token(generate_token(), &previous, now)?;
        let (access_token, _) = self.store_access_token(
            generate_token(),
            &previous.client_id,
            Some(&previous.user_id),
            previous.scopes.clone(),
            Some(refresh_record.token_hash),
            Some(previous.code_hash.clone()),
            now,
        )?;

        tracing::info!(
            client_id = %previous.client_id,
            user_id = %previous.user_id,
            scope = %previous.scopes,
            "exchanged authorization code"
        );

        Ok(TokenResponse::new(
            access_token,
            self.config.access_token_lifetime.as_secs(),
            previous.scopes.join(),
        )
        .with_refresh_token(refresh_token))
    }

    fn on_code_reuse(&self, code: &AuthorizationCode) -> AuthResult<()> {
        tracing::warn!(
            client_id = %code.client_id,
            user_id = %code.user_id,
            revoke = self.config.revoke_on_code_reuse,
            "authorization code reuse detected"
        );
        if !self.config.revoke_on_code_reuse {
            return Ok(());
        }

        let family = code.code_hash.as_str();
        let revoked = self
            .stores
            .refresh_tokens
            .remove_where(&mut |rt| rt.grant_id == family)?
            + self
                .stores
                .access_tokens
                .remove_where(&mut |at| at.grant_id.as_deref() == Some(family))?;
        tracing::warn!(client_id = %code.client_id, revoked, "revoked tokens of reused code");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Client credentials flow
    // -------------------------------------------------------------------------

    /// Issues an access token to a confidential client acting on its own
    /// behalf. No refresh token is issued.
    ///
    /// # Errors
    ///
    /// Public clients get `unauthorized_client`; bad credentials get
    /// `invalid_client`.
    pub fn client_credentials(
        &self,
        request: &TokenRequest,
    ) -> Result<TokenResponse, ErrorResponse> {
        let now = self.clock.now();
        self.client_credentials_at(request, now)
            .map_err(ErrorResponse::from)
    }

    fn client_credentials_at(
        &self,
        request: &TokenRequest,
        now: OffsetDateTime,
    ) -> AuthResult<TokenResponse> {
        self.expect_grant_type(request, GrantType::ClientCredentials)?;

        if let Some(client) = self.clients.get(&request.client_id) {
            if !client.is_confidential() {
                return Err(AuthError::unauthorized_client(
                    "public clients cannot use the client_credentials grant",
                ));
            }
        }

        let client = self
            .clients
            .authenticate(&request.client_id, request.client_secret.as_deref())?;
        self.ensure_grant_allowed(&client, GrantType::ClientCredentials)?;

        let requested = Scopes::parse(request.scope.as_deref().unwrap_or_default());
        let scopes = if requested.is_empty() {
            client_scopes(&client)
        } else {
            grant_scopes(&client, &requested)?
        };

        let (access_token, _) = self.store_access_token(
            generate_token(),
            &client.client_id,
            None,
            scopes.clone(),
            None,
            None,
            now,
        )?;

        tracing::info!(client_id = %client.client_id, scope = %scopes, "issued client credentials token");

        Ok(TokenResponse::new(
            access_token,
            self.config.access_token_lifetime.as_secs(),
            scopes.join(),
        ))
    }

    // -------------------------------------------------------------------------
    // Refresh flow
    // -------------------------------------------------------------------------

    /// Mints a new access token from a refresh token.
    ///
    /// The refresh token is returned unchanged unless rotation is enabled, in
    /// which case it is replaced by a new value with the same expiry.
    ///
    /// # Errors
    ///
    /// Returns `invalid_grant` for unknown, expired or foreign refresh tokens
    /// and `invalid_scope` when the request widens the original scopes.
    pub fn refresh(&self, request: &TokenRequest) -> Result<TokenResponse, ErrorResponse> {
        let now = self.clock.now();
        self.refresh_at(request, now).map_err(ErrorResponse::from)
    }

    fn refresh_at(&self, request: &TokenRequest, now: OffsetDateTime) -> AuthResult<TokenResponse> {
        self.expect_grant_type(request, GrantType::RefreshToken)?;

        let presented = non_empty(request.refresh_token.as_deref())
            .ok_or_else(|| AuthError::invalid_request("refresh_token is required"))?;

        let client = self
            .clients
            .authenticate(&request.client_id, request.client_secret.as_deref())?;
        self.ensure_grant_allowed(&client, GrantType::RefreshToken)?;

        let presented_hash = hash_token(presented);
        let record = self
            .stores
            .refresh_tokens
            .get(&presented_hash, now)?
            .ok_or_else(|| AuthError::invalid_grant("refresh token is invalid or expired"))?;

        if record.client_id != client.client_id {
            tracing::warn!(
                client_id = %client.client_id,
                owner = %record.client_id,
                "refresh token presented by another client"
            );
            return Err(AuthError::invalid_grant(
                "refresh token was issued to another client",
            ));
        }

        let requested = Scopes::parse(request.scope.as_deref().unwrap_or_default());
        let scopes = if requested.is_empty() {
            record.scopes.clone()
        } else if record.scopes.covers(&requested) {
            requested
        } else {
            return Err(AuthError::invalid_scope(
                "requested scope exceeds the scope of the refresh token",
            ));
        };

        let (refresh_token, refresh_hash) = if self.config.refresh_token_rotation {
            if !self.stores.refresh_tokens.delete(&presented_hash)? {
                return Err(AuthError::invalid_grant("refresh token was already rotated"));
            }
            let value = generate_token();
            let rotated = RefreshToken {
                token_hash: hash_token(&value),
                issued_at: now,
                ..record.clone()
            };
            let remaining = (record.expires_at - now).unsigned_abs();
            self.stores
                .refresh_tokens
                .put(&rotated.token_hash, rotated.clone(), now, remaining)?;
            tracing::debug!(client_id = %client.client_id, "rotated refresh token");
            (value, rotated.token_hash)
        } else {
            (presented.to_string(), presented_hash)
        };

        let (access_token, _) = self.store_access_token(
            generate_token(),
            &client.client_id,
            Some(&record.user_id),
            scopes.clone(),
            Some(refresh_hash),
            Some(record.grant_id.clone()),
            now,
        )?;

        tracing::info!(
            client_id = %client.client_id,
            user_id = %record.user_id,
            scope = %scopes,
            "refreshed access token"
        );

        Ok(TokenResponse::new(
            access_token,
            self.config.access_token_lifetime.as_secs(),
            scopes.join(),
        )
        .with_refresh_token(refresh_token))
    }

    /// Dispatches a token request on its `grant_type`.
    ///
    /// # Errors
    ///
    /// Unknown or disabled grant types yield `unsupported_grant_type`; the
    /// rest is up to the individual flow.
    pub fn token(&self, request: &TokenRequest) -> Result<TokenResponse, ErrorResponse> {
        match GrantType::parse(&request.grant_type) {
            Some(GrantType::AuthorizationCode) => self.exchange_code_for_token(request),
            Some(GrantType::ClientCredentials) => self.client_credentials(request),
            Some(GrantType::RefreshToken) => self.refresh(request),
            None => Err(AuthError::unsupported_grant_type(request.grant_type.as_str()).into()),
        }
    }

    // -------------------------------------------------------------------------
    // Validation, introspection, revocation
    // -------------------------------------------------------------------------

    /// Returns the access token record if the token is live.
    #[must_use]
    pub fn validate_access_token(&self, token: &str) -> Option<AccessToken> {
        let now = self.clock.now();
        match self.stores.access_tokens.get(&hash_token(token), now) {
            Ok(record) => record,
            Err(err) => {
                tracing::error!(error = %err, "access token lookup failed");
                None
            }
        }
    }

    /// Describes a token (RFC 7662 subset). Access tokens are looked up
    /// before refresh tokens.
    #[must_use]
    pub fn introspect(&self, token: &str) -> TokenIntrospection {
        let now = self.clock.now();
        let hash = hash_token(token);

        if let Ok(Some(at)) = self.stores.access_tokens.get(&hash, now) {
            return TokenIntrospection {
                active: true,
                scope: Some(at.scopes.join()),
                client_id: Some(at.client_id),
                user_id: at.user_id,
                token_type: Some(TokenTypeHint::AccessToken.to_string()),
                exp: Some(at.expires_at.unix_timestamp()),
            };
        }
        if let Ok(Some(rt)) = self.stores.refresh_tokens.get(&hash, now) {
            return TokenIntrospection {
                active: true,
                scope: Some(rt.scopes.join()),
                client_id: Some(rt.client_id),
                user_id: Some(rt.user_id),
                token_type: Some(TokenTypeHint::RefreshToken.to_string()),
                exp: Some(rt.expires_at.unix_timestamp()),
            };
        }
        TokenIntrospection::inactive()
    }

    /// Revokes an access or refresh token (RFC 7009).
    ///
    /// Unknown tokens and tokens owned by other clients are ignored.
    /// Revoking a refresh token also revokes the access tokens minted with it.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` if the client fails authentication.
    pub fn revoke(&self, request: &RevocationRequest) -> Result<(), ErrorResponse> {
        let now = self.clock.now();
        self.revoke_at(request, now).map_err(ErrorResponse::from)
    }

    fn revoke_at(&self, request: &RevocationRequest, now: OffsetDateTime) -> AuthResult<()> {
        let client = self
            .clients
            .authenticate(&request.client_id, request.client_secret.as_deref())?;
        let hash = hash_token(&request.token);

        let order = match request.token_type_hint {
            Some(TokenTypeHint::RefreshToken) => {
                [TokenTypeHint::RefreshToken, TokenTypeHint::AccessToken]
            }
            _ => [TokenTypeHint::AccessToken, TokenTypeHint::RefreshToken],
        };

        for kind in order {
            let owner = match kind {
                TokenTypeHint::AccessToken => self
                    .stores
                    .access_tokens
                    .get(&hash, now)?
                    .map(|t| t.client_id),
                TokenTypeHint::RefreshToken => self
                    .stores
                    .refresh_tokens
                    .get(&hash, now)?
                    .map(|t| t.client_id),
            };
            let Some(owner) = owner else { continue };

            if owner != client.client_id {
                tracing::debug!(client_id = %client.client_id, "ignoring revocation of foreign token");
                return Ok(());
            }

            match kind {
                TokenTypeHint::AccessToken => {
                    self.stores.access_tokens.delete(&hash)?;
                }
                TokenTypeHint::RefreshToken => {
                    self.stores.refresh_tokens.delete(&hash)?;
                    let cascaded = self.stores.access_tokens.remove_where(&mut |at| {
                        at.refresh_token_hash.as_deref() == Some(hash.as_str())
                    })?;
                    tracing::debug!(client_id = %client.client_id, cascaded, "revoked access tokens of refresh token");
                }
            }
            tracing::info!(client_id = %client.client_id, token_type = %kind, "revoked token");
            return Ok(());
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Consent
    // -------------------------------------------------------------------------

    /// Records (or overwrites) a user's decision for a client.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` for unknown clients.
    pub fn store_consent(
        &self,
        user_id: &str,
        client_id: &str,
        scopes: Scopes,
        approved: bool,
    ) -> Result<ConsentDecision, ErrorResponse> {
        let now = self.clock.now();
        self.store_consent_at(user_id, client_id, scopes, approved, now)
            .map_err(ErrorResponse::from)
    }

    fn store_consent_at(
        &self,
        user_id: &str,
        client_id: &str,
        scopes: Scopes,
        approved: bool,
        now: OffsetDateTime,
    ) -> AuthResult<ConsentDecision> {
        if self.clients.get(client_id).is_none() {
            return Err(AuthError::invalid_client("unknown client"));
        }
        let decision = ConsentDecision {
            user_id: user_id.to_string(),
            client_id: client_id.to_string(),
            scopes,
            approved,
            decided_at: now,
            expires_at: now + self.config.consent_lifetime,
        };
        self.stores.consents.put(
            &ConsentDecision::key(user_id, client_id),
            decision.clone(),
            now,
            self.config.consent_lifetime,
        )?;
        tracing::info!(client_id, user_id, approved, scope = %decision.scopes, "stored consent");
        Ok(decision)
    }

    /// Forgets a user's decision for a client. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if the store fails.
    pub fn revoke_consent(&self, user_id: &str, client_id: &str) -> Result<bool, ErrorResponse> {
        self.stores
            .consents
            .delete(&ConsentDecision::key(user_id, client_id))
            .map_err(|err| AuthError::from(err).into())
    }

    // -------------------------------------------------------------------------
    // OAuth state for external logins
    // -------------------------------------------------------------------------

    /// Issues a single-use `state` value bound to a client and redirect URI.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` for unknown clients and `invalid_request` for
    /// unregistered redirect URIs.
    pub fn create_state(
        &self,
        client_id: &str,
        redirect_uri: &str,
        provider: Option<&str>,
        nonce: Option<&str>,
    ) -> Result<String, ErrorResponse> {
        let now = self.clock.now();
        self.create_state_at(client_id, redirect_uri, provider, nonce, now)
            .map_err(ErrorResponse::from)
    }

    fn create_state_at(
        &self,
        client_id: &str,
        redirect_uri: &str,
        provider: Option<&str>,
        nonce: Option<&str>,
        now: OffsetDateTime,
    ) -> AuthResult<String> {
        let client = self
            .clients
            .get(client_id)
            .filter(|c| c.active)
            .ok_or_else(|| AuthError::invalid_client("unknown client"))?;
        if !client.is_redirect_uri_allowed(redirect_uri) {
            return Err(AuthError::invalid_request(
                "redirect_uri is not registered for this client",
            ));
        }

        let value = generate_token();
        let state = OAuthState {
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            provider: provider.map(str::to_string),
            nonce: nonce.map(str::to_string),
            created_at: now,
        };
        self.stores
            .states
            .put(&hash_token(&value), state, now, self.config.state_lifetime)?;
        Ok(value)
    }

    /// Consumes a `state` value. Returns `None` for unknown, expired or
    /// already consumed values.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if the store fails.
    pub fn consume_state(&self, value: &str) -> Result<Option<OAuthState>, ErrorResponse> {
        let now = self.clock.now();
        let hash = hash_token(value);
        let consume = || -> AuthResult<Option<OAuthState>> {
            let Some(state) = self.stores.states.get(&hash, now)? else {
                return Ok(None);
            };
            // whoever deletes first owns the state
            if !self.stores.states.delete(&hash)? {
                return Ok(None);
            }
            Ok(Some(state))
        };
        consume().map_err(ErrorResponse::from)
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Removes expired entries from every namespace.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let results = [
            ("authorization_codes", self.stores.codes.sweep(now)),
            ("access_tokens", self.stores.access_tokens.sweep(now)),
            ("refresh_tokens", self.stores.refresh_tokens.sweep(now)),
            ("consents", self.stores.consents.sweep(now)),
            ("oauth_states", self.stores.states.sweep(now)),
        ];
        let mut total = 0;
        for (store, result) in results {
            match result {
                Ok(n) => total += n,
                Err(err) => tracing::error!(store, error = %err, "sweep failed"),
            }
        }
        tracing::debug!(removed = total, "swept expired grant records");
        total
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn expect_grant_type(&self, request: &TokenRequest, expected: GrantType) -> AuthResult<()> {
        match GrantType::parse(&request.grant_type) {
            Some(grant) if grant == expected => {}
            Some(_) => {
                return Err(AuthError::invalid_request(format!(
                    "grant_type must be {expected}"
                )));
            }
            None => {
                return Err(AuthError::unsupported_grant_type(
                    request.grant_type.as_str(),
                ));
            }
        }
        if !self.config.is_grant_enabled(expected) {
            return Err(AuthError::unsupported_grant_type(expected.as_str()));
        }
        Ok(())
    }

    fn ensure_grant_allowed(&self, client: &Client, grant: GrantType) -> AuthResult<()> {
        if !self.config.is_grant_enabled(grant) {
            return Err(AuthError::unsupported_grant_type(grant.as_str()));
        }
        if !client.is_grant_type_allowed(grant) {
            return Err(AuthError::unauthorized_client(format!(
                "client is not allowed to use the {grant} grant"
            )));
        }
        Ok(())
    }

    fn store_access_token(
        &self,
        value: String,
        client_id: &str,
        user_id: Option<&str>,
        scopes: Scopes,
        refresh_token_hash: Option<String>,
        grant_id: Option<String>,
        now: OffsetDateTime,
    ) -> AuthResult<(String, AccessToken)> {
        let ttl = self.config.access_token_lifetime;
        let record = AccessToken {
            token_hash: hash_token(&value),
            client_id: client_id.to_string(),
            user_id: user_id.map(str::to_string),
            scopes,
            refresh_token_hash,
            grant_id,
            issued_at: now,
            expires_at: now + ttl,
        };
        self.stores
            .access_tokens
            .put(&record.token_hash, record.clone(), now, ttl)?;
        Ok((value, record))
    }

    fn store_refresh_token(
        &self,
        value: String,
        code: &AuthorizationCode,
        now: OffsetDateTime,
    ) -> AuthResult<(String, RefreshToken)> {
        let ttl = self.config.refresh_token_lifetime;
        let record = RefreshToken {
            token_hash: hash_token(&value),
            client_id: code.client_id.clone(),
            user_id: code.user_id.clone(),
            scopes: code.scopes.clone(),
            grant_id: code.code_hash.clone(),
            issued_at: now,
            expires_at: now + ttl,
        };
        self.stores
            .refresh_tokens
            .put(&record.token_hash, record.clone(), now, ttl)?;
        Ok((value, record))
    }
}

impl std::fmt::Debug for GrantFlowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantFlowEngine")
            .field("config", &self.config)
            .field("clients", &self.clients.len())
            .finish_non_exhaustive()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn client_scopes(client: &Client) -> Scopes {
    client.scopes.iter().map(String::as_str).collect()
}

/// Requested ∩ allowed. An empty request asks for everything allowed.
fn grant_scopes(client: &Client, requested: &Scopes) -> AuthResult<Scopes> {
    let allowed = client_scopes(client);
    let granted = if requested.is_empty() {
        allowed
    } else {
        requested.intersect(&allowed)
    };
    if granted.is_empty() {
        return Err(AuthError::invalid_scope(
            "none of the requested scopes are allowed for this client",
        ));
    }
    Ok(granted)
}

fn check_code_binding(
    code: &AuthorizationCode,
    client_id: &str,
    redirect_uri: &str,
    request: &TokenRequest,
) -> AuthResult<()> {
    if code.client_id != client_id {
        return Err(AuthError::invalid_grant(
            "authorization code was issued to another client",
        ));
    }
    if code.redirect_uri != redirect_uri {
        return Err(AuthError::invalid_grant("redirect_uri does not match"));
    }
    if let Some(ref challenge) = code.code_challenge {
        let verifier = non_empty(request.code_verifier.as_deref())
            .ok_or_else(|| AuthError::invalid_grant("code_verifier is required"))?;
        let verifier = PkceVerifier::new(verifier)?;
        let method = code.code_challenge_method.unwrap_or_default();
        if let Err(err) = PkceChallenge::new(challenge.as_str())?.verify(method, &verifier) {
            tracing::warn!(client_id, method = %method, "PKCE verification failed");
            return Err(err.into());
        }
    }
    Ok(())
}
