//! Boundaries to external identity systems.
//!
//! - [`provider`] - The [`IdentityProviderClient`] contract for upstream IdPs
//! - [`social`] - Login through a provider, using the grant engine's state store
//! - [`credentials`] - Password hashing for local logins

pub mod credentials;
pub mod provider;
pub mod social;

pub use credentials::{Argon2Verifier, CredentialVerifier};
pub use provider::{IdentityProviderClient, ProviderProfile, ProviderTokens};
pub use social::{FederatedIdentity, LoginRedirect, SocialLogin};
