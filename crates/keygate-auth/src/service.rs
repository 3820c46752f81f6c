//! The assembled authorization core.

use std::sync::Arc;

use crate::AuthResult;
use crate::access::AccessController;
use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::oauth::GrantFlowEngine;
use crate::policy::PolicyEngine;
use crate::rbac::RoleGraph;
use crate::registry::ClientRegistry;

/// Owns one instance of every component, wired to a shared clock and client
/// registry.
#[derive(Debug, Clone)]
pub struct AuthCore {
    config: AuthConfig,
    clients: Arc<ClientRegistry>,
    grants: Arc<GrantFlowEngine>,
    access: AccessController,
}

impl AuthCore {
    /// Builds the core from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` fails validation.
    pub fn new(config: AuthConfig, clock: Arc<dyn Clock>) -> AuthResult<Self> {
        config.validate()?;

        let clients = Arc::new(ClientRegistry::new());
        let grants = Arc::new(GrantFlowEngine::new(
            config.oauth.clone(),
            Arc::clone(&clients),
            clock,
        ));

        let roles = Arc::new(RoleGraph::new());
        if config.rbac.bootstrap_system_roles {
            roles.bootstrap_system_roles();
        }
        let access = AccessController::new(roles, Arc::new(PolicyEngine::new()));

        tracing::info!(
            grant_types = ?config.oauth.grant_types,
            refresh_token_rotation = config.oauth.refresh_token_rotation,
            system_roles = config.rbac.bootstrap_system_roles,
            "authorization core initialized"
        );

        Ok(Self {
            config,
            clients,
            grants,
            access,
        })
    }

    /// Builds the core on the wall clock.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` fails validation.
    pub fn from_config(config: AuthConfig) -> AuthResult<Self> {
        Self::new(config, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    #[must_use]
    pub fn grants(&self) -> &Arc<GrantFlowEngine> {
        &self.grants
    }

    #[must_use]
    pub fn roles(&self) -> &Arc<RoleGraph> {
        self.access.roles()
    }

    #[must_use]
    pub fn policies(&self) -> &Arc<PolicyEngine> {
        self.access.policies()
    }

    #[must_use]
    pub fn access(&self) -> &AccessController {
        &self.access
    }
}
