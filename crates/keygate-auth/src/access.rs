//! Combined role and policy access decisions.
//!
//! A policy `deny` always wins. Otherwise access is granted when a policy
//! allows it or when one of the caller's roles grants the permission.

use std::sync::Arc;

use serde::Serialize;

use crate::policy::{PermissionContext, PolicyDecision, PolicyEngine, PolicyEvaluation};
use crate::rbac::RoleGraph;

/// The verdict of a single access check with its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    /// Whether the caller's roles alone grant the permission.
    pub rbac_granted: bool,
    pub policy: PolicyEvaluation,
}

/// Answers "may this context perform this permission".
#[derive(Debug, Clone)]
pub struct AccessController {
    roles: Arc<RoleGraph>,
    policies: Arc<PolicyEngine>,
}

impl AccessController {
    #[must_use]
    pub fn new(roles: Arc<RoleGraph>, policies: Arc<PolicyEngine>) -> Self {
        Self { roles, policies }
    }

    #[must_use]
    pub fn roles(&self) -> &Arc<RoleGraph> {
        &self.roles
    }

    #[must_use]
    pub fn policies(&self) -> &Arc<PolicyEngine> {
        &self.policies
    }

    #[must_use]
    pub fn check_access(&self, ctx: &PermissionContext, permission: &str) -> bool {
        self.check_access_detailed(ctx, permission).allowed
    }

    /// Runs both checks and reports how the verdict was reached.
    #[must_use]
    pub fn check_access_detailed(&self, ctx: &PermissionContext, permission: &str) -> AccessDecision {
        let rbac_granted = self.roles.has_permission(ctx.roles.as_slice(), permission);
        let policy = self.policies.evaluate_with_trace(ctx, permission);

        let allowed = match policy.decision {
            PolicyDecision::Deny => false,
            PolicyDecision::Allow => true,
            PolicyDecision::Neutral => rbac_granted,
        };

        tracing::debug!(
            user_id = %ctx.user_id,
            permission,
            rbac_granted,
            policy = %policy.decision,
            policy_name = policy.policy_name.as_deref().unwrap_or("-"),
            allowed,
            "access decision"
        );

        AccessDecision {
            allowed,
            rbac_granted,
            policy,
        }
    }

    /// Checks `<resource type>:<action>` for the context's resource. False
    /// when the context has no resource.
    #[must_use]
    pub fn can_access_resource(&self, ctx: &PermissionContext, action: &str) -> bool {
        let Some(resource) = ctx.resource.as_ref() else {
            tracing::debug!(user_id = %ctx.user_id, action, "no resource in context");
            return false;
        };
        self.check_access(ctx, &format!("{}:{action}", resource.resource_type))
    }
}
