//! OAuth 2.0 client domain types.
//!
//! This module defines the registered [`Client`] record, the
//! [`ClientRegistration`] input used to create one, and the grant types a
//! client may be allowed to use.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use time::OffsetDateTime;

// =============================================================================
// Grant Type
// =============================================================================

/// OAuth 2.0 grant types.
///
/// Defines the authorization flows a client is allowed to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization Code flow, optionally bound with PKCE.
    AuthorizationCode,
    /// Client Credentials flow (confidential clients only).
    ClientCredentials,
    /// Refresh Token flow.
    RefreshToken,
}

impl GrantType {
    /// Parses the `grant_type` parameter value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "authorization_code" => Some(Self::AuthorizationCode),
            "client_credentials" => Some(Self::ClientCredentials),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }

    /// Returns the OAuth 2.0 grant_type parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Client Type
// =============================================================================

/// Client confidentiality type (RFC 6749 Section 2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// Can keep a secret; authenticates with it.
    #[default]
    Confidential,
    /// Cannot keep a secret (browser or native apps).
    Public,
}

impl ClientType {
    /// Returns the string form used in configuration files.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confidential => "confidential",
            Self::Public => "public",
        }
    }
}

impl std::fmt::Display for ClientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_grant_types() -> Vec<GrantType> {
    vec![GrantType::AuthorizationCode, GrantType::RefreshToken]
}

// =============================================================================
// Client
// =============================================================================

/// A registered OAuth 2.0 client.
///
/// The client secret is never kept in plaintext; only its SHA-256 digest is
/// stored and compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier used in OAuth flows.
    pub client_id: String,

    /// Human-readable display name.
    pub name: String,

    /// Confidentiality type.
    pub client_type: ClientType,

    /// Hex-encoded SHA-256 of the client secret (confidential clients only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_hash: Option<String>,

    /// Allowed redirect URIs. Matching is exact.
    pub redirect_uris: Vec<String>,

    /// Scopes this client may request.
    pub scopes: Vec<String>,

    /// Grant types this client may use.
    pub grant_types: Vec<GrantType>,

    /// Whether an authorization request must carry a PKCE challenge.
    pub pkce_required: bool,

    /// Whether the user must approve the requested scopes.
    pub require_consent: bool,

    /// Trusted (first-party) clients skip consent.
    pub trusted: bool,

    /// Inactive clients cannot authenticate.
    pub active: bool,

    /// Registration time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Last administrative update.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Client {
    /// Returns `true` for confidential clients.
    #[must_use]
    pub fn is_confidential(&self) -> bool {
        self.client_type == ClientType::Confidential
    }

    /// Checks if the given redirect URI is registered for this client.
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }

    /// Checks if the given scope is allowed for this client.
    #[must_use]
    pub fn is_scope_allowed(&self, scope: &str) -> bool {
        self.scopes.iter().any(|allowed| allowed == scope)
    }

    /// Checks if the given grant type is allowed for this client.
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    /// Returns whether the user must be asked for consent.
    #[must_use]
    pub fn needs_consent(&self) -> bool {
        self.require_consent && !self.trusted
    }

    /// Checks a presented secret against the stored digest.
    ///
    /// Public clients have no secret and always fail this check.
    #[must_use]
    pub fn verify_secret(&self, secret: &str) -> bool {
        match self.secret_hash {
            Some(ref stored) => stored.as_bytes().ct_eq(hash_secret(secret).as_bytes()).into(),
            None => false,
        }
    }
}

/// Hashes a client secret for storage.
#[must_use]
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

// =============================================================================
// Registration
// =============================================================================

/// Input for registering a new client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistration {
    /// Requested client identifier.
    pub client_id: String,

    /// Display name. Defaults to the client id.
    #[serde(default)]
    pub name: Option<String>,

    /// Confidentiality type.
    #[serde(default)]
    pub client_type: ClientType,

    /// Plaintext secret; hashed at registration.
    #[serde(default)]
    pub secret: Option<String>,

    /// Allowed redirect URIs.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Allowed scopes.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Allowed grant types.
    #[serde(default = "default_grant_types")]
    pub grant_types: Vec<GrantType>,

    /// Whether PKCE is mandatory.
    #[serde(default)]
    pub pkce_required: bool,

    /// Whether the user must consent.
    #[serde(default)]
    pub require_consent: bool,

    /// Whether the client is first-party.
    #[serde(default)]
    pub trusted: bool,
}

impl ClientRegistration {
    /// Starts a registration for a confidential client.
    #[must_use]
    pub fn confidential(client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::new(client_id, ClientType::Confidential).with_secret(secret)
    }

    /// Starts a registration for a public client.
    #[must_use]
    pub fn public(client_id: impl Into<String>) -> Self {
        Self::new(client_id, ClientType::Public)
    }

    /// Starts a registration with the given type and no secret.
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_type: ClientType) -> Self {
        Self {
            client_id: client_id.into(),
            name: None,
            client_type,
            secret: None,
            redirect_uris: Vec::new(),
            scopes: Vec::new(),
            grant_types: default_grant_types(),
            pkce_required: false,
            require_consent: false,
            trusted: false,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the plaintext secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Adds a redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.push(uri.into());
        self
    }

    /// Replaces the allowed scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the allowed grant types.
    #[must_use]
    pub fn with_grant_types(mut self, grant_types: impl Into<Vec<GrantType>>) -> Self {
        self.grant_types = grant_types.into();
        self
    }

    /// Makes PKCE mandatory.
    #[must_use]
    pub fn require_pkce(mut self) -> Self {
        self.pkce_required = true;
        self
    }

    /// Requires user consent.
    #[must_use]
    pub fn require_consent(mut self) -> Self {
        self.require_consent = true;
        self
    }

    /// Marks the client as trusted.
    #[must_use]
    pub fn trusted(mut self) -> Self {
        self.trusted = true;
        self
    }

    /// Validates the registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the registration is incomplete or inconsistent.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.trim().is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }

        if self.client_type == ClientType::Confidential
            && self.secret.as_deref().is_none_or(str::is_empty)
        {
            return Err(ClientValidationError::MissingSecret);
        }

        if self.redirect_uris.is_empty() {
            return Err(ClientValidationError::NoRedirectUris);
        }

        for uri in &self.redirect_uris {
            if url::Url::parse(uri).is_err() {
                return Err(ClientValidationError::InvalidRedirectUri(uri.clone()));
            }
        }

        if self.grant_types.is_empty() {
            return Err(ClientValidationError::NoGrantTypes);
        }

        Ok(())
    }

    /// Turns a validated registration into a client record.
    pub(crate) fn into_client(self, now: OffsetDateTime) -> Client {
        Client {
            name: self.name.unwrap_or_else(|| self.client_id.clone()),
            client_id: self.client_id,
            client_type: self.client_type,
            secret_hash: match self.client_type {
                ClientType::Confidential => self.secret.as_deref().map(hash_secret),
                ClientType::Public => None,
            },
            redirect_uris: self.redirect_uris,
            scopes: self.scopes,
            grant_types: self.grant_types,
            pkce_required: self.pkce_required,
            require_consent: self.require_consent,
            trusted: self.trusted,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Errors that can occur during client registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientValidationError {
    /// Client ID cannot be empty.
    #[error("Client ID cannot be empty")]
    EmptyClientId,

    /// Confidential clients require a client secret.
    #[error("Confidential clients require a client secret")]
    MissingSecret,

    /// At least one redirect URI is required.
    #[error("At least one redirect URI is required")]
    NoRedirectUris,

    /// A redirect URI is not an absolute URL.
    #[error("Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),

    /// At least one grant type is required.
    #[error("At least one grant type is required")]
    NoGrantTypes,

    /// A client with this id already exists.
    #[error("Client already registered: {0}")]
    AlreadyExists(String),

    /// No client with this id exists.
    #[error("Client not found: {0}")]
    NotFound(String),
}

impl From<ClientValidationError> for crate::AuthError {
    fn from(err: ClientValidationError) -> Self {
        match err {
            ClientValidationError::NotFound(_) => Self::invalid_client(err.to_string()),
            other => Self::invalid_request(other.to_string()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn registration() -> ClientRegistration {
        ClientRegistration::confidential("c1", "s1")
            .with_redirect_uri("https://app/cb")
            .with_scopes(["read"])
    }

    #[test]
    fn test_valid_registration() {
        assert!(registration().validate().is_ok());
        assert!(
            ClientRegistration::public("spa")
                .with_redirect_uri("http://localhost:3000/cb")
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_empty_client_id() {
        let mut reg = registration();
        reg.client_id = "  ".to_string();
        assert_eq!(reg.validate(), Err(ClientValidationError::EmptyClientId));
    }

    #[test]
    fn test_confidential_without_secret() {
        let mut reg = registration();
        reg.secret = None;
        assert_eq!(reg.validate(), Err(ClientValidationError::MissingSecret));

        reg.secret = Some(String::new());
        assert_eq!(reg.validate(), Err(ClientValidationError::MissingSecret));
    }

    #[test]
    fn test_no_redirect_uris() {
        let mut reg = registration();
        reg.redirect_uris.clear();
        assert_eq!(reg.validate(), Err(ClientValidationError::NoRedirectUris));
    }

    #[test]
    fn test_relative_redirect_uri() {
        let reg = registration().with_redirect_uri("/callback");
        assert_eq!(
            reg.validate(),
            Err(ClientValidationError::InvalidRedirectUri("/callback".to_string()))
        );
    }

    #[test]
    fn test_into_client_hashes_secret() {
        let client = registration().into_client(datetime!(2025-01-01 00:00 UTC));
        assert_eq!(client.name, "c1");
        assert_ne!(client.secret_hash.as_deref(), Some("s1"));
        assert!(client.verify_secret("s1"));
        assert!(!client.verify_secret("s2"));
        assert_eq!(client.created_at, client.updated_at);
        assert!(client.active);
    }

    #[test]
    fn test_verify_secret_rejects_near_misses() {
        let mut client = registration().into_client(datetime!(2025-01-01 00:00 UTC));
        assert!(!client.verify_secret(""));
        assert!(!client.verify_secret("s1 "));
        assert!(!client.verify_secret("S1"));

        // a truncated stored digest never matches
        let digest = client.secret_hash.clone().unwrap();
        client.secret_hash = Some(digest[..32].to_string());
        assert!(!client.verify_secret("s1"));
    }

    #[test]
    fn test_public_client_has_no_secret() {
        let client = ClientRegistration::public("spa")
            .with_secret("ignored")
            .with_redirect_uri("https://spa/cb")
            .into_client(datetime!(2025-01-01 00:00 UTC));
        assert!(client.secret_hash.is_none());
        assert!(!client.verify_secret("ignored"));
    }

    #[test]
    fn test_client_predicates() {
        let client = registration()
            .require_consent()
            .into_client(datetime!(2025-01-01 00:00 UTC));
        assert!(client.is_redirect_uri_allowed("https://app/cb"));
        assert!(!client.is_redirect_uri_allowed("https://app/cb/"));
        assert!(client.is_scope_allowed("read"));
        assert!(!client.is_scope_allowed("write"));
        assert!(client.is_grant_type_allowed(GrantType::AuthorizationCode));
        assert!(!client.is_grant_type_allowed(GrantType::ClientCredentials));
        assert!(client.needs_consent());

        let trusted = registration()
            .require_consent()
            .trusted()
            .into_client(datetime!(2025-01-01 00:00 UTC));
        assert!(!trusted.needs_consent());
    }

    #[test]
    fn test_grant_type_parse() {
        assert_eq!(
            GrantType::parse("client_credentials"),
            Some(GrantType::ClientCredentials)
        );
        assert_eq!(GrantType::parse("password"), None);
        assert_eq!(GrantType::RefreshToken.to_string(), "refresh_token");
    }

    #[test]
    fn test_registration_deserialize_defaults() {
        let json = r#"{ "client_id": "c9", "secret": "x", "redirect_uris": ["https://a/cb"] }"#;
        let reg: ClientRegistration = serde_json::from_str(json).unwrap();
        assert_eq!(reg.client_type, ClientType::Confidential);
        assert_eq!(reg.grant_types, default_grant_types());
        assert!(!reg.pkce_required);
    }
}
