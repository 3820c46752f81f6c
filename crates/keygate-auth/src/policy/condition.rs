//! Policy conditions.
//!
//! Attribute paths are resolved through a closed table ([`AttributePath`])
//! rather than by walking arbitrary JSON, and regex operands are compiled when
//! the condition is built.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::PolicyError;
use super::context::PermissionContext;

// =============================================================================
// Attribute Paths
// =============================================================================

/// A known dot-path into a [`PermissionContext`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributePath {
    UserId,
    UserRoles,
    ResourceType,
    ResourceId,
    ResourceOwnerId,
    ResourceAttribute(String),
    EnvironmentIp,
    EnvironmentTime,
    EnvironmentLocale,
    Custom(String),
}

impl AttributePath {
    /// Parses a dot-path such as `resource.attributes.department`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAttributePath` for anything outside the table.
    pub fn parse(path: &str) -> Result<Self, PolicyError> {
        let parsed = match path {
            "user.id" => Self::UserId,
            "user.roles" => Self::UserRoles,
            "resource.type" => Self::ResourceType,
            "resource.id" => Self::ResourceId,
            "resource.owner_id" => Self::ResourceOwnerId,
            "environment.ip" => Self::EnvironmentIp,
            "environment.time" => Self::EnvironmentTime,
            "environment.locale" => Self::EnvironmentLocale,
            other => {
                if let Some(key) = other.strip_prefix("resource.attributes.") {
                    Self::ResourceAttribute(key.to_string())
                } else if let Some(key) = other.strip_prefix("custom.") {
                    Self::Custom(key.to_string())
                } else {
                    return Err(PolicyError::UnknownAttributePath(path.to_string()));
                }
            }
        };

        match &parsed {
            Self::ResourceAttribute(key) | Self::Custom(key) if key.is_empty() => {
                Err(PolicyError::UnknownAttributePath(path.to_string()))
            }
            _ => Ok(parsed),
        }
    }

    /// Looks the attribute up. `None` when it is absent from the context.
    #[must_use]
    pub fn resolve(&self, ctx: &PermissionContext) -> Option<Value> {
        let resource = ctx.resource.as_ref();
        match self {
            Self::UserId => Some(Value::String(ctx.user_id.clone())),
            Self::UserRoles => Some(Value::from(ctx.roles.clone())),
            Self::ResourceType => resource.map(|r| Value::String(r.resource_type.clone())),
            Self::ResourceId => resource.and_then(|r| r.id.clone()).map(Value::String),
            Self::ResourceOwnerId => resource.and_then(|r| r.owner_id.clone()).map(Value::String),
            Self::ResourceAttribute(key) => resource.and_then(|r| r.attributes.get(key).cloned()),
            Self::EnvironmentIp => ctx.environment.ip.clone().map(Value::String),
            Self::EnvironmentTime => ctx
                .environment
                .time
                .and_then(|t| t.format(&Rfc3339).ok())
                .map(Value::String),
            Self::EnvironmentLocale => ctx.environment.locale.clone().map(Value::String),
            Self::Custom(key) => ctx.custom.get(key).cloned(),
        }
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserId => f.write_str("user.id"),
            Self::UserRoles => f.write_str("user.roles"),
            Self::ResourceType => f.write_str("resource.type"),
            Self::ResourceId => f.write_str("resource.id"),
            Self::ResourceOwnerId => f.write_str("resource.owner_id"),
            Self::ResourceAttribute(key) => write!(f, "resource.attributes.{key}"),
            Self::EnvironmentIp => f.write_str("environment.ip"),
            Self::EnvironmentTime => f.write_str("environment.time"),
            Self::EnvironmentLocale => f.write_str("environment.locale"),
            Self::Custom(key) => write!(f, "custom.{key}"),
        }
    }
}

// =============================================================================
// Operators
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeOperator {
    Equals,
    NotEquals,
    /// Substring for strings, membership for arrays.
    Contains,
    /// Regular expression match on strings.
    Matches,
    /// Numeric, or RFC 3339 timestamps.
    GreaterThan,
    LessThan,
}

impl AttributeOperator {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::Matches => "matches",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
        }
    }
}

impl fmt::Display for AttributeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOperator {
    Before,
    After,
}

impl fmt::Display for TimeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Before => "before",
            Self::After => "after",
        })
    }
}

// =============================================================================
// Conditions
// =============================================================================

/// `path operator value`.
#[derive(Debug, Clone)]
pub struct AttributeCondition {
    pub path: AttributePath,
    pub operator: AttributeOperator,
    pub value: Value,
    pattern: Option<Regex>,
}

impl AttributeCondition {
    fn evaluate(&self, ctx: &PermissionContext) -> bool {
        let Some(actual) = self.path.resolve(ctx) else {
            return self.operator == AttributeOperator::NotEquals;
        };

        match self.operator {
            AttributeOperator::Equals => actual == self.value,
            AttributeOperator::NotEquals => actual != self.value,
            AttributeOperator::Contains => match (&actual, &self.value) {
                (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
                (Value::Array(items), expected) => items.contains(expected),
                _ => false,
            },
            AttributeOperator::Matches => match (&actual, &self.pattern) {
                (Value::String(s), Some(re)) => re.is_match(s),
                _ => false,
            },
            AttributeOperator::GreaterThan => {
                compare(&actual, &self.value).is_some_and(|o| o.is_gt())
            }
            AttributeOperator::LessThan => compare(&actual, &self.value).is_some_and(|o| o.is_lt()),
        }
    }
}

/// Compares two numbers, or two RFC 3339 timestamps.
fn compare(actual: &Value, expected: &Value) -> Option<std::cmp::Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => {
            let a = OffsetDateTime::parse(a, &Rfc3339).ok()?;
            let b = OffsetDateTime::parse(b, &Rfc3339).ok()?;
            Some(a.cmp(&b))
        }
        _ => None,
    }
}

/// Compares `environment.time` against a fixed instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeCondition {
    pub operator: TimeOperator,
    pub at: OffsetDateTime,
}

impl TimeCondition {
    fn evaluate(&self, ctx: &PermissionContext) -> bool {
        match (ctx.environment.time, self.operator) {
            (Some(now), TimeOperator::Before) => now < self.at,
            (Some(now), TimeOperator::After) => now > self.at,
            (None, _) => false,
        }
    }
}

type Predicate = dyn Fn(&PermissionContext) -> bool + Send + Sync;

/// A caller-supplied predicate. Only constructible in code.
#[derive(Clone)]
pub struct CustomCondition {
    pub name: String,
    predicate: Arc<Predicate>,
}

impl CustomCondition {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&PermissionContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }
}

impl fmt::Debug for CustomCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomCondition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// One clause of a policy. All clauses of a policy must hold.
#[derive(Debug, Clone)]
pub enum Condition {
    /// The resource owner is the caller.
    Ownership,
    Attribute(AttributeCondition),
    Time(TimeCondition),
    Custom(CustomCondition),
}

impl Condition {
    /// Builds an attribute condition, compiling the path and, for `matches`,
    /// the regex.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown paths, and for `matches` with a
    /// non-string or invalid pattern.
    pub fn attribute(
        path: &str,
        operator: AttributeOperator,
        value: impl Into<Value>,
    ) -> Result<Self, PolicyError> {
        let path = AttributePath::parse(path)?;
        let value = value.into();
        let pattern = if operator == AttributeOperator::Matches {
            let Value::String(ref source) = value else {
                return Err(PolicyError::InvalidPattern {
                    pattern: value.to_string(),
                    message: "matches needs a string pattern".to_string(),
                });
            };
            Some(Regex::new(source).map_err(|e| PolicyError::InvalidPattern {
                pattern: source.clone(),
                message: e.to_string(),
            })?)
        } else {
            None
        };

        Ok(Self::Attribute(AttributeCondition {
            path,
            operator,
            value,
            pattern,
        }))
    }

    #[must_use]
    pub fn before(at: OffsetDateTime) -> Self {
        Self::Time(TimeCondition {
            operator: TimeOperator::Before,
            at,
        })
    }

    #[must_use]
    pub fn after(at: OffsetDateTime) -> Self {
        Self::Time(TimeCondition {
            operator: TimeOperator::After,
            at,
        })
    }

    pub fn custom(
        name: impl Into<String>,
        predicate: impl Fn(&PermissionContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::Custom(CustomCondition::new(name, predicate))
    }

    /// Evaluates the condition against a request context.
    #[must_use]
    pub fn evaluate(&self, ctx: &PermissionContext) -> bool {
        match self {
            Self::Ownership => ctx.is_owner(),
            Self::Attribute(c) => c.evaluate(ctx),
            Self::Time(c) => c.evaluate(ctx),
            Self::Custom(c) => (c.predicate)(ctx),
        }
    }

    /// The serializable form. `None` for custom predicates.
    #[must_use]
    pub fn to_document(&self) -> Option<ConditionDocument> {
        match self {
            Self::Ownership => Some(ConditionDocument::Ownership),
            Self::Attribute(c) => Some(ConditionDocument::Attribute {
                path: c.path.to_string(),
                operator: c.operator,
                value: c.value.clone(),
            }),
            Self::Time(c) => Some(ConditionDocument::Time {
                operator: c.operator,
                at: c.at,
            }),
            Self::Custom(_) => None,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ownership => f.write_str("ownership"),
            Self::Attribute(c) => write!(f, "{} {} {}", c.path, c.operator, c.value),
            Self::Time(c) => match c.at.format(&Rfc3339) {
                Ok(at) => write!(f, "time {} {at}", c.operator),
                Err(_) => write!(f, "time {} {}", c.operator, c.at),
            },
            Self::Custom(c) => write!(f, "custom:{}", c.name),
        }
    }
}

// =============================================================================
// Documents
// =============================================================================

/// Serializable condition, as found in bootstrap files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionDocument {
    Ownership,
    Attribute {
        path: String,
        operator: AttributeOperator,
        value: Value,
    },
    Time {
        operator: TimeOperator,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    },
}

impl TryFrom<ConditionDocument> for Condition {
    type Error = PolicyError;

    fn try_from(doc: ConditionDocument) -> Result<Self, Self::Error> {
        match doc {
            ConditionDocument::Ownership => Ok(Self::Ownership),
            ConditionDocument::Attribute {
                path,
                operator,
                value,
            } => Self::attribute(&path, operator, value),
            ConditionDocument::Time { operator, at } => Ok(Self::Time(TimeCondition { operator, at })),
        }
    }
}
