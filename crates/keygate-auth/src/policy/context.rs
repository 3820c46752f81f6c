//! Per-request input to access decisions.
//!
//! ```
//! use keygate_auth::policy::{Environment, PermissionContext, ResourceDescriptor};
//!
//! let ctx = PermissionContext::new("u1")
//!     .with_roles(["user"])
//!     .with_resource(ResourceDescriptor::new("document").with_id("d1").with_owner("u1"))
//!     .with_environment(Environment::new().with_ip("10.0.0.1"));
//!
//! assert!(ctx.is_owner());
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

// =============================================================================
// Permission Context
// =============================================================================

/// Who is asking, about what, and under which circumstances.
///
/// Built per request and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionContext {
    pub user_id: String,

    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceDescriptor>,

    #[serde(default)]
    pub environment: Environment,

    /// Free-form attributes supplied by the caller.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, Value>,
}

impl PermissionContext {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_resource(mut self, resource: ResourceDescriptor) -> Self {
        self.resource = Some(resource);
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    /// Returns `true` if the resource has an owner and it is the caller.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.resource
            .as_ref()
            .and_then(|r| r.owner_id.as_deref())
            .is_some_and(|owner| owner == self.user_id)
    }
}

// =============================================================================
// Resource Descriptor
// =============================================================================

/// The resource an action targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    #[serde(rename = "type")]
    pub resource_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Value>,
}

impl ResourceDescriptor {
    #[must_use]
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// Environment
// =============================================================================

/// Request circumstances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<OffsetDateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    #[must_use]
    pub fn with_time(mut self, time: OffsetDateTime) -> Self {
        self.time = Some(time);
        self
    }

    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn test_ownership() {
        let ctx = PermissionContext::new("u1");
        assert!(!ctx.is_owner());

        let ctx = ctx.with_resource(ResourceDescriptor::new("doc"));
        assert!(!ctx.is_owner());

        let ctx = PermissionContext::new("u1").with_resource(ResourceDescriptor::new("doc").with_owner("u2"));
        assert!(!ctx.is_owner());

        let ctx = PermissionContext::new("u2").with_resource(ResourceDescriptor::new("doc").with_owner("u2"));
        assert!(ctx.is_owner());
    }

    #[test]
    fn test_serde_shape() {
        let ctx = PermissionContext::new("u1")
            .with_roles(["user"])
            .with_resource(ResourceDescriptor::new("doc").with_attribute("level", 3))
            .with_environment(Environment::new().with_time(datetime!(2025-01-01 09:00 UTC)))
            .with_custom("tenant", "acme");

        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(value["resource"]["type"], "doc");
        assert_eq!(value["resource"]["attributes"]["level"], 3);
        assert_eq!(value["environment"]["time"], "2025-01-01T09:00:00Z");
        assert_eq!(value["custom"]["tenant"], json!("acme"));

        let back: PermissionContext = serde_json::from_value(value).unwrap();
        assert_eq!(back, ctx);
    }
}
