//! OAuth 2.0 authorization server core.
//!
//! - [`authorize`] - Request/response types for the authorization endpoint
//! - [`token`] - Request/response types for the token endpoint
//! - [`revocation`] - Token revocation (RFC 7009)
//! - [`pkce`] - PKCE challenge/verifier implementation
//! - [`engine`] - The grant flows themselves
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use keygate_auth::clock::SystemClock;
//! use keygate_auth::config::OAuthConfig;
//! use keygate_auth::oauth::{AuthorizationRequest, GrantFlowEngine, TokenRequest};
//! use keygate_auth::registry::ClientRegistry;
//! use keygate_auth::types::ClientRegistration;
//!
//! let clients = Arc::new(ClientRegistry::new());
//! clients
//!     .register(
//!         ClientRegistration::confidential("c1", "s1")
//!             .with_redirect_uri("https://app/cb")
//!             .with_scopes(["read"]),
//!         time::OffsetDateTime::now_utc(),
//!     )
//!     .unwrap();
//!
//! let engine = GrantFlowEngine::new(OAuthConfig::default(), clients, Arc::new(SystemClock));
//! let outcome = engine
//!     .authorize(&AuthorizationRequest::code("c1", "https://app/cb", "read"), "u1")
//!     .unwrap();
//!
//! let tokens = engine
//!     .exchange_code_for_token(
//!         &TokenRequest::authorization_code("c1", outcome.code().unwrap(), "https://app/cb")
//!             .with_secret("s1"),
//!     )
//!     .unwrap();
//! assert!(engine.validate_access_token(&tokens.access_token).is_some());
//! ```

pub mod authorize;
pub mod engine;
pub mod pkce;
pub mod revocation;
pub mod token;

pub use authorize::{AuthorizationRequest, AuthorizationResponse, AuthorizeOutcome, ConsentPrompt};
pub use engine::{GrantFlowEngine, GrantStores};
pub use pkce::{PkceChallenge, PkceError, PkceMethod, PkceVerifier};
pub use revocation::{RevocationRequest, TokenTypeHint};
pub use token::{TokenIntrospection, TokenRequest, TokenResponse};
