//! # keygate-auth
//!
//! OAuth 2.0 authorization core with role- and policy-based access control.
//!
//! This crate provides:
//! - A client registry with confidential/public clients and hashed secrets
//! - Authorization code (with PKCE), client credentials and refresh grants
//! - Consent tracking, token introspection and revocation
//! - A role graph with inherited, wildcard-aware permissions
//! - A priority-ordered allow/deny policy engine
//! - A facade combining both into a single access decision
//!
//! ## Modules
//!
//! - [`config`] - Lifetimes, grant switches and role bootstrap settings
//! - [`registry`] - Registered OAuth clients
//! - [`store`] - TTL-indexed record stores
//! - [`oauth`] - The grant flows
//! - [`rbac`] - Roles and permission resolution
//! - [`policy`] - Context-aware policies
//! - [`access`] - Combined access decisions
//! - [`federation`] - External identity providers and password hashing
//! - [`service`] - [`AuthCore`], everything wired together
//!
//! There is no HTTP layer here; endpoints map their parameters onto the
//! request types in [`oauth`] and serialize [`ErrorResponse`] back.

pub mod access;
pub mod clock;
pub mod config;
pub mod error;
pub mod federation;
pub mod oauth;
pub mod policy;
pub mod rbac;
pub mod registry;
pub mod service;
pub mod store;
pub mod types;

pub use access::{AccessController, AccessDecision};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, ConfigError, OAuthConfig, RbacConfig};
pub use error::{AuthError, ErrorCategory, ErrorKind, ErrorResponse};
pub use oauth::{GrantFlowEngine, GrantStores};
pub use policy::{PermissionContext, PolicyDecision, PolicyEngine, PolicyError};
pub use rbac::{RbacError, Role, RoleGraph};
pub use registry::ClientRegistry;
pub use service::AuthCore;
pub use store::{MemoryStore, ResourceStore, StoreError};
pub use types::{Client, ClientRegistration, ClientType, GrantType, Scopes};

/// Type alias for authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```
/// use keygate_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::access::{AccessController, AccessDecision};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::{AuthConfig, ConfigError, OAuthConfig, RbacConfig};
    pub use crate::error::{AuthError, ErrorCategory, ErrorKind, ErrorResponse};
    pub use crate::federation::{
        Argon2Verifier, CredentialVerifier, FederatedIdentity, IdentityProviderClient,
        SocialLogin,
    };
    pub use crate::oauth::{
        AuthorizationRequest, AuthorizeOutcome, GrantFlowEngine, PkceChallenge, PkceMethod,
        PkceVerifier, RevocationRequest, TokenRequest, TokenResponse,
    };
    pub use crate::policy::{
        Condition, PermissionContext, Policy, PolicyDecision, PolicyEngine, ResourceDescriptor,
    };
    pub use crate::rbac::{Role, RoleGraph};
    pub use crate::registry::ClientRegistry;
    pub use crate::service::AuthCore;
    pub use crate::types::{ClientRegistration, GrantType, Scopes};
}
