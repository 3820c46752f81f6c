//! Role records and the built-in system roles.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

// =============================================================================
// Role Type
// =============================================================================

/// A named bundle of permission patterns.
///
/// A role also holds every permission of the roles it `inherits`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role name (e.g. "admin", "user").
    pub name: String,

    /// Human-readable description of the role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Direct `resource:action` patterns.
    #[serde(default)]
    pub permissions: BTreeSet<String>,

    /// Parent role names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inherits: Vec<String>,

    /// Display and listing order. Higher first.
    #[serde(default)]
    pub priority: i32,

    /// System roles cannot be removed.
    #[serde(default)]
    pub is_system: bool,
}

impl Role {
    /// Creates an empty role.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            permissions: BTreeSet::new(),
            inherits: Vec::new(),
            priority: 0,
            is_system: false,
        }
    }

    /// Creates a new role builder.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> RoleBuilder {
        RoleBuilder {
            role: Self::new(name),
        }
    }

    /// Returns `true` if the role directly holds `permission` verbatim.
    #[must_use]
    pub fn has_direct_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

// =============================================================================
// Role Builder
// =============================================================================

/// Builder for creating `Role` instances.
#[derive(Debug)]
pub struct RoleBuilder {
    role: Role,
}

impl RoleBuilder {
    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.role.description = Some(description.into());
        self
    }

    /// Adds a permission pattern.
    #[must_use]
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.role.permissions.insert(permission.into());
        self
    }

    /// Adds several permission patterns.
    #[must_use]
    pub fn permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.role
            .permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    /// Adds a parent role.
    #[must_use]
    pub fn inherits(mut self, parent: impl Into<String>) -> Self {
        self.role.inherits.push(parent.into());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.role.priority = priority;
        self
    }

    /// Sets whether this is a system role.
    #[must_use]
    pub fn system(mut self, is_system: bool) -> Self {
        self.role.is_system = is_system;
        self
    }

    /// Builds the role.
    #[must_use]
    pub fn build(self) -> Role {
        self.role
    }
}

// =============================================================================
// System Roles
// =============================================================================

pub const SUPER_ADMIN: &str = "super_admin";
pub const ADMIN: &str = "admin";
pub const USER: &str = "user";
pub const GUEST: &str = "guest";

/// The built-in role hierarchy: `super_admin`, then `admin` → `user` → `guest`.
#[must_use]
pub fn system_roles() -> Vec<Role> {
    vec![
        Role::builder(SUPER_ADMIN)
            .description("Unrestricted access")
            .permission("*:*")
            .priority(1000)
            .system(true)
            .build(),
        Role::builder(ADMIN)
            .description("Manages users, clients and policies")
            .permissions(["users:*", "roles:read", "policies:*", "clients:*"])
            .inherits(USER)
            .priority(100)
            .system(true)
            .build(),
        Role::builder(USER)
            .description("Authenticated user")
            .permissions(["profile:read", "profile:update"])
            .inherits(GUEST)
            .priority(10)
            .system(true)
            .build(),
        Role::builder(GUEST)
            .description("Anonymous access")
            .permission("public:read")
            .priority(0)
            .system(true)
            .build(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let role = Role::builder("editor")
            .permission("posts:write")
            .permissions(["posts:read", "posts:write"])
            .inherits("user")
            .priority(5)
            .build();
        assert_eq!(role.permissions.len(), 2);
        assert!(role.has_direct_permission("posts:read"));
        assert_eq!(role.inherits, ["user"]);
        assert!(!role.is_system);
    }

    #[test]
    fn test_system_roles() {
        let roles = system_roles();
        assert_eq!(roles.len(), 4);
        assert!(roles.iter().all(|r| r.is_system));
        assert!(roles[0].has_direct_permission("*:*"));
        assert_eq!(roles[1].inherits, [USER]);
    }

    #[test]
    fn test_deserialize_defaults() {
        let role: Role = serde_json::from_str(r#"{"name":"viewer","permissions":["a:read"]}"#).unwrap();
        assert_eq!(role.priority, 0);
        assert!(role.inherits.is_empty());
        assert!(!role.is_system);
    }
}
