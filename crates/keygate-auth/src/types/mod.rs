//! Domain records shared by the registry, the stores and the grant flows.

pub mod client;
pub mod scope;
pub mod token;

pub use client::{
    Client, ClientRegistration, ClientType, ClientValidationError, GrantType, hash_secret,
};
pub use scope::Scopes;
pub use token::{
    AccessToken, AuthorizationCode, ConsentDecision, OAuthState, RefreshToken, generate_token,
    hash_token,
};
