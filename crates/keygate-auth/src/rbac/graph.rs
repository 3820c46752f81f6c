//! Role hierarchy with memoized permission resolution.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use super::RbacError;
use super::permission::any_implies;
use super::role::{Role, system_roles};

/// Roles keyed by name, plus a cache of resolved permission sets.
///
/// Lock order is always `roles` before `cache`. Every mutation clears the
/// whole cache while holding the `roles` write lock, so a resolution never
/// caches a set computed from a stale graph.
#[derive(Debug, Default)]
pub struct RoleGraph {
    roles: RwLock<HashMap<String, Role>>,
    cache: RwLock<HashMap<String, Arc<HashSet<String>>>>,
}

impl RoleGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a graph holding the built-in system roles.
    #[must_use]
    pub fn with_system_roles() -> Self {
        let graph = Self::new();
        graph.bootstrap_system_roles();
        graph
    }

    /// Installs (or reinstalls) `super_admin`, `admin`, `user` and `guest`.
    pub fn bootstrap_system_roles(&self) {
        let mut roles = self.roles.write();
        for role in system_roles() {
            roles.insert(role.name.clone(), role);
        }
        self.invalidate();
    }

    /// Adds a role, replacing any role with the same name.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty name or an empty permission pattern.
    pub fn add_role(&self, role: Role) -> Result<Option<Role>, RbacError> {
        if role.name.trim().is_empty() {
            return Err(RbacError::EmptyRoleName);
        }
        if role.permissions.iter().any(|p| p.is_empty()) {
            return Err(RbacError::InvalidPermission {
                role: role.name,
                permission: String::new(),
            });
        }

        let mut roles = self.roles.write();
        tracing::debug!(role = %role.name, permissions = role.permissions.len(), "adding role");
        let previous = roles.insert(role.name.clone(), role);
        self.invalidate();
        Ok(previous)
    }

    /// Removes a role. Parents referencing it become dangling and are skipped.
    ///
    /// # Errors
    ///
    /// Returns `SystemRole` for built-in roles.
    pub fn remove_role(&self, name: &str) -> Result<Option<Role>, RbacError> {
        let mut roles = self.roles.write();
        if roles.get(name).is_some_and(|r| r.is_system) {
            return Err(RbacError::SystemRole(name.to_string()));
        }
        let removed = roles.remove(name);
        if removed.is_some() {
            self.invalidate();
        }
        Ok(removed)
    }

    #[must_use]
    pub fn get_role(&self, name: &str) -> Option<Role> {
        self.roles.read().get(name).cloned()
    }

    /// All roles, highest priority first, then by name.
    #[must_use]
    pub fn list_roles(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = self.roles.read().values().cloned().collect();
        roles.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        roles
    }

    /// Direct and inherited permission patterns of a role.
    ///
    /// Unknown roles resolve to an empty set. Cycles are cut: a role already
    /// visited during this resolution is not expanded again.
    #[must_use]
    pub fn get_role_permissions(&self, name: &str) -> Arc<HashSet<String>> {
        let roles = self.roles.read();
        if let Some(hit) = self.cache.read().get(name) {
            return Arc::clone(hit);
        }

        let resolved = Arc::new(resolve(&roles, name));
        self.cache
            .write()
            .insert(name.to_string(), Arc::clone(&resolved));
        resolved
    }

    /// Union of the resolved permissions of every role, sorted.
    #[must_use]
    pub fn get_user_permissions<S: AsRef<str>>(&self, roles: &[S]) -> BTreeSet<String> {
        roles
            .iter()
            .flat_map(|role| {
                self.get_role_permissions(role.as_ref())
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Returns `true` if any of `roles` grants `required`.
    #[must_use]
    pub fn has_permission<S: AsRef<str>>(&self, roles: &[S], required: &str) -> bool {
        roles.iter().any(|role| {
            let granted = self.get_role_permissions(role.as_ref());
            any_implies(granted.iter().map(String::as_str), required)
        })
    }

    /// Number of roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.read().is_empty()
    }

    fn invalidate(&self) {
        let mut cache = self.cache.write();
        if !cache.is_empty() {
            tracing::debug!(entries = cache.len(), "invalidating role permission cache");
            cache.clear();
        }
    }
}

fn resolve(roles: &HashMap<String, Role>, start: &str) -> HashSet<String> {
    let mut permissions = HashSet::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack = vec![start];

    while let Some(name) = stack.pop() {
        if !visited.insert(name) {
            continue;
        }
        let Some(role) = roles.get(name) else {
            continue;
        };
        permissions.extend(role.permissions.iter().cloned());
        // reversed so the first parent is expanded first
        stack.extend(role.inherits.iter().rev().map(String::as_str));
    }
    permissions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(name: &str, permissions: &[&str], inherits: &[&str]) -> Role {
        let mut builder = Role::builder(name).permissions(permissions.iter().copied());
        for parent in inherits {
            builder = builder.inherits(*parent);
        }
        builder.build()
    }

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_inheritance_chain() {
        let graph = RoleGraph::with_system_roles();
        let admin = graph.get_role_permissions("admin");
        assert!(admin.contains("users:*"));
        assert!(admin.contains("profile:read"));
        assert!(admin.contains("public:read"));
        assert_eq!(admin.len(), 7);
    }

    #[test]
    fn test_super_admin_grants_everything() {
        let graph = RoleGraph::with_system_roles();
        for required in ["users:delete", "billing:refund", "x:y"] {
            assert!(graph.has_permission(&["super_admin"], required));
        }
    }

    #[test]
    fn test_cycle_terminates() {
        let graph = RoleGraph::new();
        graph.add_role(role("a", &["a:read"], &["b"])).unwrap();
        graph.add_role(role("b", &["b:read"], &["a"])).unwrap();

        assert_eq!(*graph.get_role_permissions("a"), set(&["a:read", "b:read"]));
        assert_eq!(*graph.get_role_permissions("b"), set(&["a:read", "b:read"]));
    }

    #[test]
    fn test_self_cycle_and_missing_parent() {
        let graph = RoleGraph::new();
        graph.add_role(role("solo", &["s:read"], &["solo", "ghost"])).unwrap();
        assert_eq!(*graph.get_role_permissions("solo"), set(&["s:read"]));
        assert!(graph.get_role_permissions("ghost").is_empty());
    }

    #[test]
    fn test_cache_invalidated_on_mutation() {
        let graph = RoleGraph::new();
        graph.add_role(role("base", &["a:read"], &[])).unwrap();
        graph.add_role(role("child", &[], &["base"])).unwrap();
        assert!(graph.has_permission(&["child"], "a:read"));

        graph.add_role(role("base", &["b:read"], &[])).unwrap();
        assert!(!graph.has_permission(&["child"], "a:read"));
        assert!(graph.has_permission(&["child"], "b:read"));

        graph.remove_role("base").unwrap();
        assert!(graph.get_role_permissions("child").is_empty());
    }

    #[test]
    fn test_cached_set_is_shared() {
        let graph = RoleGraph::with_system_roles();
        let first = graph.get_role_permissions("user");
        let second = graph.get_role_permissions("user");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_system_role_not_removable() {
        let graph = RoleGraph::with_system_roles();
        assert_eq!(
            graph.remove_role("admin").unwrap_err(),
            RbacError::SystemRole("admin".to_string())
        );
        assert!(graph.get_role("admin").is_some());
        assert!(graph.remove_role("nope").unwrap().is_none());
    }

    #[test]
    fn test_add_role_validation() {
        let graph = RoleGraph::new();
        assert_eq!(
            graph.add_role(Role::new(" ")).unwrap_err(),
            RbacError::EmptyRoleName
        );
        assert!(matches!(
            graph.add_role(Role::builder("r").permission("").build()),
            Err(RbacError::InvalidPermission { .. })
        ));
    }

    #[test]
    fn test_user_permissions_union() {
        let graph = RoleGraph::with_system_roles();
        let perms = graph.get_user_permissions(&["guest", "missing"]);
        assert_eq!(perms.into_iter().collect::<Vec<_>>(), ["public:read"]);

        assert!(graph.has_permission(&["guest", "user"], "profile:update"));
        assert!(!graph.has_permission(&["guest"], "profile:update"));
        assert!(!graph.has_permission::<&str>(&[], "public:read"));
    }

    #[test]
    fn test_list_roles_order() {
        let graph = RoleGraph::with_system_roles();
        graph.add_role(Role::builder("auditor").priority(10).build()).unwrap();
        let names: Vec<String> = graph.list_roles().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["super_admin", "admin", "auditor", "user", "guest"]);
    }
}
