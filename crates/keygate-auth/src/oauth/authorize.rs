//! Authorization endpoint types.
//!
//! The authorization endpoint is the first step of the authorization code flow:
//!
//! 1. Client sends the user to the authorization endpoint with these parameters
//! 2. The user authenticates and, if required, consents
//! 3. The server redirects back to the client with a one-time code
//! 4. Client exchanges the code at the token endpoint

use serde::{Deserialize, Serialize};

use crate::types::Scopes;

/// Authorization request parameters.
///
/// # Example
///
/// ```ignore
/// GET /authorize?
///   response_type=code
///   &client_id=my-app
///   &redirect_uri=https://app.example.com/callback
///   &scope=read
///   &state=abc123xyz
///   &code_challenge=E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM
///   &code_challenge_method=S256
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// Must be "code".
    pub response_type: String,

    /// Client identifier issued during registration.
    pub client_id: String,

    /// Must exactly match one of the registered redirect URIs.
    pub redirect_uri: String,

    /// Requested scopes (space-separated). Empty means every scope the client
    /// is allowed.
    #[serde(default)]
    pub scope: String,

    /// CSRF state, echoed in the response and in error responses.
    #[serde(default)]
    pub state: String,

    /// PKCE code challenge.
    #[serde(default)]
    pub code_challenge: Option<String>,

    /// PKCE method, "S256" or "plain". Defaults to "plain" when a challenge
    /// is present.
    #[serde(default)]
    pub code_challenge_method: Option<String>,

    /// OpenID Connect nonce.
    #[serde(default)]
    pub nonce: Option<String>,
}

impl AuthorizationRequest {
    /// Starts a `response_type=code` request.
    #[must_use]
    pub fn code(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            response_type: "code".to_string(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scope: scope.into(),
            ..Self::default()
        }
    }

    /// Sets the state.
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    /// Attaches a PKCE challenge.
    #[must_use]
    pub fn with_pkce(mut self, challenge: impl Into<String>, method: impl Into<String>) -> Self {
        self.code_challenge = Some(challenge.into());
        self.code_challenge_method = Some(method.into());
        self
    }

    /// Sets the nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }
}

/// Authorization response parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationResponse {
    /// Single-use authorization code.
    pub code: String,

    /// Echoed state parameter.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub state: String,
}

impl AuthorizationResponse {
    /// Creates a new authorization response.
    #[must_use]
    pub fn new(code: String, state: String) -> Self {
        Self { code, state }
    }

    /// Builds the redirect URL with response parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `redirect_uri` is not a valid absolute URL.
    pub fn to_redirect_url(&self, redirect_uri: &str) -> Result<String, url::ParseError> {
        let mut url = url::Url::parse(redirect_uri)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("code", &self.code);
            if !self.state.is_empty() {
                pairs.append_pair("state", &self.state);
            }
        }
        Ok(url.to_string())
    }
}

/// What the consent screen needs to ask the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsentPrompt {
    pub client_id: String,
    pub client_name: String,
    pub user_id: String,
    /// Scopes the user is asked to approve.
    pub scopes: Scopes,
    /// Echoed state, so the caller can resume the request.
    pub state: String,
}

/// Successful result of [`authorize`](crate::oauth::GrantFlowEngine::authorize).
///
/// `ConsentRequired` is a control signal, not an error: the caller shows a
/// consent screen, records the answer with
/// [`store_consent`](crate::oauth::GrantFlowEngine::store_consent) and
/// repeats the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeOutcome {
    /// A code was issued.
    Code(AuthorizationResponse),
    /// The user has to approve the scopes first.
    ConsentRequired(ConsentPrompt),
}

impl AuthorizeOutcome {
    /// Returns the issued code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Code(response) => Some(&response.code),
            Self::ConsentRequired(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = AuthorizationRequest::code("c1", "https://app/cb", "read")
            .with_state("xyz")
            .with_pkce("abc", "S256")
            .with_nonce("n-1");
        assert_eq!(req.response_type, "code");
        assert_eq!(req.code_challenge.as_deref(), Some("abc"));
        assert_eq!(req.code_challenge_method.as_deref(), Some("S256"));
        assert_eq!(req.nonce.as_deref(), Some("n-1"));
    }

    #[test]
    fn test_request_deserialize_minimal() {
        let json = r#"{"response_type":"code","client_id":"c1","redirect_uri":"https://app/cb"}"#;
        let req: AuthorizationRequest = serde_json::from_str(json).unwrap();
        assert!(req.scope.is_empty());
        assert!(req.code_challenge.is_none());
    }

    #[test]
    fn test_response_redirect_url() {
        let response = AuthorizationResponse::new("K".into(), "xyz".into());
        let url = response.to_redirect_url("https://app/cb?x=1").unwrap();
        assert_eq!(url, "https://app/cb?x=1&code=K&state=xyz");

        let no_state = AuthorizationResponse::new("K".into(), String::new());
        assert_eq!(
            no_state.to_redirect_url("https://app/cb").unwrap(),
            "https://app/cb?code=K"
        );
    }
}
