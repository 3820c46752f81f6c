//! Registered OAuth clients.

use std::collections::HashMap;

use parking_lot::RwLock;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::AuthError;
use crate::types::{Client, ClientRegistration, ClientValidationError};

/// In-memory registry of OAuth clients keyed by client id.
///
/// Records are never deleted; [`deactivate`](Self::deactivate) takes a client
/// out of service while keeping its history.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, Client>>,
}

impl ClientRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the registration is invalid or the id is taken.
    pub fn register(
        &self,
        registration: ClientRegistration,
        now: OffsetDateTime,
    ) -> Result<Client, ClientValidationError> {
        registration.validate()?;

        let mut clients = self.clients.write();
        if clients.contains_key(&registration.client_id) {
            return Err(ClientValidationError::AlreadyExists(registration.client_id));
        }

        let client = registration.into_client(now);
        tracing::info!(
            client_id = %client.client_id,
            client_type = %client.client_type,
            "registered client"
        );
        clients.insert(client.client_id.clone(), client.clone());
        Ok(client)
    }

    /// Applies an administrative update and bumps `updated_at`.
    ///
    /// The client id and creation time cannot be changed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids.
    pub fn update(
        &self,
        client_id: &str,
        now: OffsetDateTime,
        f: impl FnOnce(&mut Client),
    ) -> Result<Client, ClientValidationError> {
        let mut clients = self.clients.write();
        let client = clients
            .get_mut(client_id)
            .ok_or_else(|| ClientValidationError::NotFound(client_id.to_string()))?;

        let created_at = client.created_at;
        f(client);
        client.client_id = client_id.to_string();
        client.created_at = created_at;
        client.updated_at = now;

        if client.redirect_uris.is_empty() {
            tracing::warn!(client_id, "client updated with no redirect URIs");
        }
        Ok(client.clone())
    }

    /// Takes a client out of service.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids.
    pub fn deactivate(
        &self,
        client_id: &str,
        now: OffsetDateTime,
    ) -> Result<Client, ClientValidationError> {
        self.update(client_id, now, |client| client.active = false)
    }

    /// Looks up a client.
    #[must_use]
    pub fn get(&self, client_id: &str) -> Option<Client> {
        self.clients.read().get(client_id).cloned()
    }

    /// All clients, sorted by id.
    #[must_use]
    pub fn list(&self) -> Vec<Client> {
        let mut clients: Vec<Client> = self.clients.read().values().cloned().collect();
        clients.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        clients
    }

    /// Checks client credentials.
    ///
    /// Public clients need no secret. Confidential clients must present the
    /// registered secret. Unknown and inactive clients always fail.
    #[must_use]
    pub fn validate_credentials(&self, client_id: &str, secret: Option<&str>) -> bool {
        self.authenticate(client_id, secret).is_ok()
    }

    /// Authenticates a client and returns its record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` if the client is unknown, inactive, or the
    /// secret does not match.
    pub fn authenticate(&self, client_id: &str, secret: Option<&str>) -> AuthResult<Client> {
        let client = self
            .get(client_id)
            .ok_or_else(|| AuthError::invalid_client("unknown client"))?;

        if !client.active {
            return Err(AuthError::invalid_client("client is inactive"));
        }

        if client.is_confidential() {
            let verified = secret.is_some_and(|s| client.verify_secret(s));
            if !verified {
                tracing::warn!(client_id, "client authentication failed");
                return Err(AuthError::invalid_client("client authentication failed"));
            }
        }

        Ok(client)
    }

    /// Number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// Returns `true` if no client is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClientType, GrantType};
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);
    const T1: OffsetDateTime = datetime!(2025-02-01 00:00 UTC);

    fn confidential() -> ClientRegistration {
        ClientRegistration::confidential("c1", "s1")
            .with_redirect_uri("https://app/cb")
            .with_scopes(["read"])
    }

    #[test]
    fn test_register_stamps_timestamps() {
        let registry = ClientRegistry::new();
        let client = registry.register(confidential(), T0).unwrap();
        assert_eq!(client.created_at, T0);
        assert_eq!(client.updated_at, T0);
        assert_eq!(registry.get("c1").unwrap().client_type, ClientType::Confidential);
    }

    #[test]
    fn test_register_rejections() {
        let registry = ClientRegistry::new();

        let mut no_secret = confidential();
        no_secret.secret = None;
        assert_eq!(
            registry.register(no_secret, T0).unwrap_err(),
            ClientValidationError::MissingSecret
        );

        let mut no_uris = confidential();
        no_uris.redirect_uris.clear();
        assert_eq!(
            registry.register(no_uris, T0).unwrap_err(),
            ClientValidationError::NoRedirectUris
        );

        assert_eq!(
            registry
                .register(ClientRegistration::public("").with_redirect_uri("https://a/cb"), T0)
                .unwrap_err(),
            ClientValidationError::EmptyClientId
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = ClientRegistry::new();
        registry.register(confidential(), T0).unwrap();
        assert_eq!(
            registry.register(confidential(), T0).unwrap_err(),
            ClientValidationError::AlreadyExists("c1".to_string())
        );
    }

    #[test]
    fn test_validate_credentials() {
        let registry = ClientRegistry::new();
        registry.register(confidential(), T0).unwrap();
        registry
            .register(
                ClientRegistration::public("spa").with_redirect_uri("https://spa/cb"),
                T0,
            )
            .unwrap();

        assert!(registry.validate_credentials("c1", Some("s1")));
        assert!(!registry.validate_credentials("c1", Some("wrong")));
        assert!(!registry.validate_credentials("c1", None));
        assert!(registry.validate_credentials("spa", None));
        assert!(registry.validate_credentials("spa", Some("anything")));
        assert!(!registry.validate_credentials("nobody", None));
    }

    #[test]
    fn test_update_and_deactivate() {
        let registry = ClientRegistry::new();
        registry.register(confidential(), T0).unwrap();

        let updated = registry
            .update("c1", T1, |c| {
                c.client_id = "hijack".to_string();
                c.grant_types.push(GrantType::ClientCredentials);
            })
            .unwrap();
        assert_eq!(updated.client_id, "c1");
        assert_eq!(updated.created_at, T0);
        assert_eq!(updated.updated_at, T1);
        assert!(updated.is_grant_type_allowed(GrantType::ClientCredentials));

        registry.deactivate("c1", T1).unwrap();
        assert!(!registry.validate_credentials("c1", Some("s1")));
        assert!(matches!(
            registry.authenticate("c1", Some("s1")),
            Err(AuthError::InvalidClient { .. })
        ));
        // record is kept
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_update_unknown() {
        let registry = ClientRegistry::new();
        assert_eq!(
            registry.update("ghost", T0, |_| {}).unwrap_err(),
            ClientValidationError::NotFound("ghost".to_string())
        );
    }

    #[test]
    fn test_list_sorted() {
        let registry = ClientRegistry::new();
        for id in ["zeta", "alpha", "mid"] {
            registry
                .register(
                    ClientRegistration::public(id).with_redirect_uri("https://x/cb"),
                    T0,
                )
                .unwrap();
        }
        let ids: Vec<String> = registry.list().into_iter().map(|c| c.client_id).collect();
        assert_eq!(ids, ["alpha", "mid", "zeta"]);
    }
}
