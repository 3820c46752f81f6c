//! Authorization error types.
//!
//! [`AuthError`] is the internal error of the crate. Grant flows never let it
//! escape: it is normalized into an [`ErrorResponse`] carrying one of the
//! eight protocol [`ErrorKind`]s before it reaches the caller.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors raised inside grant flows and access decisions.
///
/// Client-side variants carry a description that is safe to return to the
/// caller. `Storage`, `Configuration` and `Internal` are server faults; their
/// text is logged but never sent back.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing or malformed parameter.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown, inactive or unauthenticated client.
    #[error("Invalid client: {0}")]
    InvalidClient(String),

    /// Bad, expired, reused or foreign code or refresh token.
    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    #[error("Unauthorized client: {0}")]
    UnauthorizedClient(String),

    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    /// Reported to the caller as `invalid_request`.
    #[error("Unsupported response type: {0}")]
    UnsupportedResponseType(String),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// The resource owner said no.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient(message.into())
    }

    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant(message.into())
    }

    #[must_use]
    pub fn unauthorized_client(message: impl Into<String>) -> Self {
        Self::UnauthorizedClient(message.into())
    }

    /// `grant_type` is the offending value as received.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType(grant_type.into())
    }

    /// `response_type` is the offending value as received.
    #[must_use]
    pub fn unsupported_response_type(response_type: impl Into<String>) -> Self {
        Self::UnsupportedResponseType(response_type.into())
    }

    #[must_use]
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope(message.into())
    }

    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied(message.into())
    }

    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Storage, configuration and internal faults.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Configuration(_) | Self::Internal(_)
        )
    }

    /// Coarse grouping used as a log field.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidClient(_) | Self::InvalidGrant(_) => ErrorCategory::Authentication,
            Self::UnauthorizedClient(_) | Self::InvalidScope(_) | Self::AccessDenied(_) => {
                ErrorCategory::Authorization
            }
            Self::InvalidRequest(_)
            | Self::UnsupportedGrantType(_)
            | Self::UnsupportedResponseType(_) => ErrorCategory::Validation,
            Self::Storage(_) => ErrorCategory::Infrastructure,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// The protocol error kind this error is reported as.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) | Self::UnsupportedResponseType(_) => ErrorKind::InvalidRequest,
            Self::InvalidClient(_) => ErrorKind::InvalidClient,
            Self::InvalidGrant(_) => ErrorKind::InvalidGrant,
            Self::UnauthorizedClient(_) => ErrorKind::UnauthorizedClient,
            Self::UnsupportedGrantType(_) => ErrorKind::UnsupportedGrantType,
            Self::InvalidScope(_) => ErrorKind::InvalidScope,
            Self::AccessDenied(_) => ErrorKind::AccessDenied,
            Self::Storage(_) | Self::Configuration(_) | Self::Internal(_) => ErrorKind::ServerError,
        }
    }

    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Description for the caller, without the kind prefix. Server faults
    /// get a fixed text.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::InvalidRequest(message)
            | Self::InvalidClient(message)
            | Self::InvalidGrant(message)
            | Self::UnauthorizedClient(message)
            | Self::InvalidScope(message)
            | Self::AccessDenied(message) => message.clone(),
            Self::UnsupportedGrantType(grant_type) => {
                format!("grant type '{grant_type}' is not supported")
            }
            Self::UnsupportedResponseType(response_type) => {
                format!("response type '{response_type}' is not supported")
            }
            Self::Storage(_) | Self::Configuration(_) | Self::Internal(_) => {
                "the authorization server encountered an unexpected condition".to_string()
            }
        }
    }
}

/// Log grouping of [`AuthError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Authentication,
    Authorization,
    Validation,
    Infrastructure,
    Configuration,
    Internal,
}

impl ErrorCategory {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Validation => "validation",
            Self::Infrastructure => "infrastructure",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Protocol Error Values
// =============================================================================

/// The closed set of protocol error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    InvalidScope,
    AccessDenied,
    ServerError,
}

impl ErrorKind {
    /// Returns the wire representation of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::AccessDenied => "access_denied",
            Self::ServerError => "server_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error returned by every grant flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error kind.
    pub error: ErrorKind,

    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,

    /// Echoed `state` of the authorization request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl ErrorResponse {
    /// Creates an error response without description or state.
    #[must_use]
    pub fn new(error: ErrorKind) -> Self {
        Self {
            error,
            error_description: None,
            state: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.error_description = Some(description.into());
        self
    }

    /// Sets the echoed state. Empty states are dropped.
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        let state = state.into();
        self.state = (!state.is_empty()).then_some(state);
        self
    }

    /// Appends `error`, `error_description` and `state` to a redirect URI.
    ///
    /// # Errors
    ///
    /// Returns an error if `redirect_uri` is not a valid absolute URL.
    pub fn to_redirect_url(&self, redirect_uri: &str) -> Result<String, url::ParseError> {
        let mut url = url::Url::parse(redirect_uri)?;
        let params = [
            ("error", Some(self.error.as_str())),
            ("error_description", self.error_description.as_deref()),
            ("state", self.state.as_deref()),
        ];
        url.query_pairs_mut()
            .extend_pairs(params.into_iter().filter_map(|(k, v)| Some((k, v?))));
        Ok(url.into())
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error_description {
            Some(ref desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for ErrorResponse {}

impl From<AuthError> for ErrorResponse {
    fn from(err: AuthError) -> Self {
        if err.is_server_error() {
            tracing::error!(category = %err.category(), error = %err, "internal fault in grant flow");
        }
        Self::new(err.kind()).with_description(err.description())
    }
}
