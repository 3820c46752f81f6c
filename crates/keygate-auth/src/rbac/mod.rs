//! Role-based access control.
//!
//! Roles hold `resource:action` patterns and may inherit other roles. The
//! [`RoleGraph`] resolves the inherited set once per role and caches it until
//! the next mutation.
//!
//! ```
//! use keygate_auth::rbac::{Role, RoleGraph};
//!
//! let graph = RoleGraph::with_system_roles();
//! graph
//!     .add_role(Role::builder("editor").permission("posts:*").inherits("user").build())
//!     .unwrap();
//!
//! assert!(graph.has_permission(&["editor"], "posts:publish"));
//! assert!(graph.has_permission(&["editor"], "profile:read"));
//! assert!(!graph.has_permission(&["editor"], "users:delete"));
//! ```

pub mod graph;
pub mod permission;
pub mod role;

pub use graph::RoleGraph;
pub use permission::Permission;
pub use role::{Role, RoleBuilder, system_roles};

/// Errors from role administration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RbacError {
    #[error("Role name cannot be empty")]
    EmptyRoleName,

    #[error("Role '{role}' has an invalid permission pattern: '{permission}'")]
    InvalidPermission { role: String, permission: String },

    /// Built-in roles cannot be removed.
    #[error("Cannot remove system role: {0}")]
    SystemRole(String),
}

impl From<RbacError> for crate::AuthError {
    fn from(err: RbacError) -> Self {
        Self::invalid_request(err.to_string())
    }
}
