//! `resource:action` permission patterns.

use std::fmt;

/// Matches anything.
pub const GLOBAL_WILDCARD: &str = "*";

/// A parsed `resource:action` permission string.
///
/// A string without `:` is a bare resource with no action segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Permission<'a> {
    pub resource: &'a str,
    pub action: Option<&'a str>,
}

impl<'a> Permission<'a> {
    /// Splits on the first `:`.
    #[must_use]
    pub fn parse(value: &'a str) -> Self {
        match value.split_once(':') {
            Some((resource, action)) => Self {
                resource,
                action: Some(action),
            },
            None => Self {
                resource: value,
                action: None,
            },
        }
    }

    /// Returns `true` if this granted pattern satisfies `required`.
    ///
    /// - exact match
    /// - `*` and `*:*` grant everything
    /// - `resource:*` grants any action on `resource`, and anything whose
    ///   resource segment is empty
    /// - `*:action` grants `action` on any resource
    #[must_use]
    pub fn implies(&self, required: &Permission<'_>) -> bool {
        if self == required || self.is_global() {
            return true;
        }

        match self.action {
            Some("*") => required.resource.is_empty() || self.resource == required.resource,
            Some(action) if self.resource == GLOBAL_WILDCARD => required.action == Some(action),
            _ => false,
        }
    }

    fn is_global(&self) -> bool {
        self.resource == GLOBAL_WILDCARD && matches!(self.action, None | Some("*"))
    }
}

impl fmt::Display for Permission<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            Some(action) => write!(f, "{}:{}", self.resource, action),
            None => f.write_str(self.resource),
        }
    }
}

/// Returns `true` if any of `granted` implies `required`.
#[must_use]
pub fn any_implies<'a>(granted: impl IntoIterator<Item = &'a str>, required: &str) -> bool {
    let required = Permission::parse(required);
    granted
        .into_iter()
        .any(|pattern| Permission::parse(pattern).implies(&required))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn implies(granted: &str, required: &str) -> bool {
        Permission::parse(granted).implies(&Permission::parse(required))
    }

    #[test]
    fn test_parse() {
        let p = Permission::parse("users:read");
        assert_eq!(p.resource, "users");
        assert_eq!(p.action, Some("read"));
        assert_eq!(Permission::parse("users").action, None);
        assert_eq!(Permission::parse("a:b:c").action, Some("b:c"));
        assert_eq!(Permission::parse("a:b:c").to_string(), "a:b:c");
    }

    #[test]
    fn test_exact() {
        assert!(implies("users:read", "users:read"));
        assert!(!implies("users:read", "users:write"));
        assert!(!implies("users:read", "roles:read"));
    }

    #[test]
    fn test_global() {
        for required in ["users:read", "x:y", "anything", ":read"] {
            assert!(implies("*", required));
            assert!(implies("*:*", required));
        }
    }

    #[test]
    fn test_resource_wildcard() {
        assert!(implies("users:*", "users:read"));
        assert!(implies("users:*", "users:delete"));
        assert!(implies("users:*", ":read"));
        assert!(!implies("users:*", "roles:read"));
    }

    #[test]
    fn test_action_wildcard() {
        assert!(implies("*:read", "users:read"));
        assert!(implies("*:read", "roles:read"));
        assert!(!implies("*:read", "users:write"));
        assert!(!implies("*:read", "users"));
    }

    #[test]
    fn test_any_implies() {
        assert!(any_implies(["profile:read", "users:*"], "users:update"));
        assert!(!any_implies(["profile:read"], "users:update"));
        assert!(!any_implies(Vec::<&str>::new(), "users:update"));
    }
}
