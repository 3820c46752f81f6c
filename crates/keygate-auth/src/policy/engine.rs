//! Ordered allow/deny policy evaluation.
//!
//! Policies are held sorted by descending priority; equal priorities keep
//! insertion order. The first policy whose patterns match and whose
//! conditions all hold decides. If none does, the result is
//! [`PolicyDecision::Neutral`].

use std::fmt;

use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PolicyError;
use super::condition::{Condition, ConditionDocument};
use super::context::PermissionContext;

// =============================================================================
// Decisions
// =============================================================================

/// What a matching policy does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyEffect {
    Allow,
    Deny,
}

impl fmt::Display for PolicyEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        })
    }
}

/// Outcome of policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyDecision {
    Allow,
    Deny,
    /// No policy applied.
    #[default]
    Neutral,
}

impl PolicyDecision {
    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    #[must_use]
    pub fn is_deny(&self) -> bool {
        matches!(self, Self::Deny)
    }
}

impl From<PolicyEffect> for PolicyDecision {
    fn from(effect: PolicyEffect) -> Self {
        match effect {
            PolicyEffect::Allow => Self::Allow,
            PolicyEffect::Deny => Self::Deny,
        }
    }
}

impl fmt::Display for PolicyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Neutral => "neutral",
        })
    }
}

/// A decision together with the policy that made it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PolicyEvaluation {
    pub decision: PolicyDecision,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_name: Option<String>,
}

impl PolicyEvaluation {
    #[must_use]
    pub fn neutral() -> Self {
        Self::default()
    }
}

// =============================================================================
// Policy
// =============================================================================

/// A prioritized, conditional allow/deny rule.
///
/// `resources` and `actions` are glob patterns (`*` and `?`). An empty list
/// matches nothing.
#[derive(Debug, Clone)]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub effect: PolicyEffect,
    pub resources: Vec<String>,
    pub actions: Vec<String>,
    pub conditions: Vec<Condition>,
    pub priority: i32,
}

impl Policy {
    /// A policy on every resource and action, with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>, effect: PolicyEffect) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            effect,
            resources: vec!["*".to_string()],
            actions: vec!["*".to_string()],
            conditions: Vec::new(),
            priority: 0,
        }
    }

    #[must_use]
    pub fn allow(name: impl Into<String>) -> Self {
        Self::new(name, PolicyEffect::Allow)
    }

    #[must_use]
    pub fn deny(name: impl Into<String>) -> Self {
        Self::new(name, PolicyEffect::Deny)
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources = resources.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// The serializable form. Custom conditions are left out.
    #[must_use]
    pub fn to_document(&self) -> PolicyDocument {
        PolicyDocument {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            description: self.description.clone(),
            effect: self.effect,
            resources: self.resources.clone(),
            actions: self.actions.clone(),
            conditions: self
                .conditions
                .iter()
                .filter_map(Condition::to_document)
                .collect(),
            priority: self.priority,
        }
    }
}

/// Serializable policy, as found in bootstrap files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub effect: PolicyEffect,

    #[serde(default = "match_all")]
    pub resources: Vec<String>,

    #[serde(default = "match_all")]
    pub actions: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ConditionDocument>,

    #[serde(default)]
    pub priority: i32,
}

fn match_all() -> Vec<String> {
    vec!["*".to_string()]
}

impl TryFrom<PolicyDocument> for Policy {
    type Error = PolicyError;

    fn try_from(doc: PolicyDocument) -> Result<Self, Self::Error> {
        let mut policy = Policy::new(doc.name, doc.effect)
            .with_resources(doc.resources)
            .with_actions(doc.actions)
            .with_priority(doc.priority);
        if let Some(id) = doc.id {
            policy.id = id;
        }
        policy.description = doc.description;
        for condition in doc.conditions {
            policy.conditions.push(condition.try_into()?);
        }
        Ok(policy)
    }
}

// =============================================================================
// Glob Compilation
// =============================================================================

/// Compiles a glob into an anchored regex: `*` is any run, `?` any single
/// character, everything else literal.
///
/// # Errors
///
/// Returns `InvalidPattern` for empty globs or if the regex fails to build.
pub fn compile_glob(pattern: &str) -> Result<Regex, PolicyError> {
    if pattern.is_empty() {
        return Err(PolicyError::InvalidPattern {
            pattern: String::new(),
            message: "pattern cannot be empty".to_string(),
        });
    }

    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for c in pattern.chars() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    source.push('$');

    Regex::new(&source).map_err(|e| PolicyError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

// =============================================================================
// Engine
// =============================================================================

#[derive(Debug)]
struct CompiledPolicy {
    policy: Policy,
    resources: Vec<Regex>,
    actions: Vec<Regex>,
}

impl CompiledPolicy {
    fn compile(policy: Policy) -> Result<Self, PolicyError> {
        let resources = policy
            .resources
            .iter()
            .map(|p| compile_glob(p))
            .collect::<Result<_, _>>()?;
        let actions = policy
            .actions
            .iter()
            .map(|p| compile_glob(p))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            policy,
            resources,
            actions,
        })
    }

    fn applies_to(&self, resource: &str, action: &str) -> bool {
        self.resources.iter().any(|re| re.is_match(resource))
            && self.actions.iter().any(|re| re.is_match(action))
    }

    fn conditions_hold(&self, ctx: &PermissionContext) -> bool {
        self.policy.conditions.iter().all(|c| c.evaluate(ctx))
    }
}

/// Holds policies in evaluation order.
#[derive(Debug, Default)]
pub struct PolicyEngine {
    policies: RwLock<Vec<CompiledPolicy>>,
}

impl PolicyEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles and inserts a policy after every policy of equal or higher
    /// priority.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateId` if the id is taken and `InvalidPattern` if a
    /// glob does not compile.
    pub fn add_policy(&self, policy: Policy) -> Result<(), PolicyError> {
        let compiled = CompiledPolicy::compile(policy)?;

        let mut policies = self.policies.write();
        if policies.iter().any(|p| p.policy.id == compiled.policy.id) {
            return Err(PolicyError::DuplicateId(compiled.policy.id));
        }

        let priority = compiled.policy.priority;
        let index = policies.partition_point(|p| p.policy.priority >= priority);
        tracing::debug!(
            policy_id = %compiled.policy.id,
            name = %compiled.policy.name,
            priority,
            position = index,
            "adding policy"
        );
        policies.insert(index, compiled);
        Ok(())
    }

    /// Removes a policy by id. Returns whether it existed.
    pub fn remove_policy(&self, id: &str) -> bool {
        let mut policies = self.policies.write();
        let before = policies.len();
        policies.retain(|p| p.policy.id != id);
        before != policies.len()
    }

    #[must_use]
    pub fn get_policy(&self, id: &str) -> Option<Policy> {
        self.policies
            .read()
            .iter()
            .find(|p| p.policy.id == id)
            .map(|p| p.policy.clone())
    }

    /// All policies in evaluation order.
    #[must_use]
    pub fn list_policies(&self) -> Vec<Policy> {
        self.policies.read().iter().map(|p| p.policy.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.read().is_empty()
    }

    /// Decides `permission` (`resource:action`) for `ctx`.
    #[must_use]
    pub fn evaluate(&self, ctx: &PermissionContext, permission: &str) -> PolicyDecision {
        self.evaluate_with_trace(ctx, permission).decision
    }

    /// Like [`evaluate`](Self::evaluate), also naming the deciding policy.
    #[must_use]
    pub fn evaluate_with_trace(&self, ctx: &PermissionContext, permission: &str) -> PolicyEvaluation {
        let (resource, action) = permission.split_once(':').unwrap_or((permission, ""));

        let policies = self.policies.read();
        let deciding = policies
            .iter()
            .find(|p| p.applies_to(resource, action) && p.conditions_hold(ctx));

        match deciding {
            Some(p) => PolicyEvaluation {
                decision: p.policy.effect.into(),
                policy_id: Some(p.policy.id.clone()),
                policy_name: Some(p.policy.name.clone()),
            },
            None => PolicyEvaluation::neutral(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::condition::AttributeOperator;
    use crate::policy::context::ResourceDescriptor;
    use serde_json::json;

    fn owned_doc(user: &str, owner: &str) -> PermissionContext {
        PermissionContext::new(user).with_resource(ResourceDescriptor::new("documents").with_owner(owner))
    }

    #[test]
    fn test_glob() {
        let re = compile_glob("doc*").unwrap();
        assert!(re.is_match("documents"));
        assert!(re.is_match("doc"));
        assert!(!re.is_match("mydoc"));

        let re = compile_glob("v?.read").unwrap();
        assert!(re.is_match("v1.read"));
        assert!(!re.is_match("v1xread"));
        assert!(!re.is_match("v10.read"));

        assert!(compile_glob("a+b").unwrap().is_match("a+b"));
        assert!(compile_glob("").is_err());
    }

    #[test]
    fn test_neutral_when_nothing_matches() {
        let engine = PolicyEngine::new();
        assert_eq!(engine.evaluate(&PermissionContext::new("u1"), "a:b"), PolicyDecision::Neutral);

        engine
            .add_policy(Policy::allow("reports").with_resources(["reports"]))
            .unwrap();
        assert_eq!(engine.evaluate(&PermissionContext::new("u1"), "users:read"), PolicyDecision::Neutral);
        assert_eq!(engine.evaluate(&PermissionContext::new("u1"), "reports:read"), PolicyDecision::Allow);
    }

    #[test]
    fn test_higher_priority_deny_wins() {
        let engine = PolicyEngine::new();
        engine
            .add_policy(Policy::allow("allow-docs").with_resources(["documents"]).with_priority(50))
            .unwrap();
        engine
            .add_policy(Policy::deny("deny-docs").with_resources(["documents"]).with_priority(100))
            .unwrap();

        let trace = engine.evaluate_with_trace(&PermissionContext::new("u1"), "documents:read");
        assert_eq!(trace.decision, PolicyDecision::Deny);
        assert_eq!(trace.policy_name.as_deref(), Some("deny-docs"));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let engine = PolicyEngine::new();
        engine.add_policy(Policy::deny("first").with_priority(10)).unwrap();
        engine.add_policy(Policy::allow("second").with_priority(10)).unwrap();
        engine.add_policy(Policy::allow("low").with_priority(-5)).unwrap();
        engine.add_policy(Policy::allow("high").with_priority(20)).unwrap();

        let names: Vec<String> = engine.list_policies().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["high", "first", "second", "low"]);
    }

    #[test]
    fn test_conditions_gate_policy() {
        let engine = PolicyEngine::new();
        engine
            .add_policy(
                Policy::allow("owner-edit")
                    .with_resources(["documents"])
                    .with_actions(["update", "delete"])
                    .with_condition(Condition::Ownership)
                    .with_priority(10),
            )
            .unwrap();
        engine
            .add_policy(Policy::deny("fallback").with_resources(["documents"]))
            .unwrap();

        assert_eq!(engine.evaluate(&owned_doc("u1", "u1"), "documents:update"), PolicyDecision::Allow);
        assert_eq!(engine.evaluate(&owned_doc("u1", "u2"), "documents:update"), PolicyDecision::Deny);
        // action pattern does not match, falls through
        assert_eq!(engine.evaluate(&owned_doc("u1", "u1"), "documents:share"), PolicyDecision::Deny);
    }

    #[test]
    fn test_all_conditions_required() {
        let engine = PolicyEngine::new();
        engine
            .add_policy(
                Policy::allow("sales-owner")
                    .with_condition(Condition::Ownership)
                    .with_condition(
                        Condition::attribute("custom.department", AttributeOperator::Equals, "sales").unwrap(),
                    ),
            )
            .unwrap();

        let ctx = owned_doc("u1", "u1");
        assert_eq!(engine.evaluate(&ctx, "documents:read"), PolicyDecision::Neutral);
        let ctx = ctx.with_custom("department", "sales");
        assert_eq!(engine.evaluate(&ctx, "documents:read"), PolicyDecision::Allow);
    }

    #[test]
    fn test_permission_without_action() {
        let engine = PolicyEngine::new();
        engine
            .add_policy(Policy::allow("any-action").with_resources(["health"]))
            .unwrap();
        engine
            .add_policy(Policy::allow("read-only").with_resources(["status"]).with_actions(["read"]))
            .unwrap();

        let ctx = PermissionContext::new("u1");
        assert_eq!(engine.evaluate(&ctx, "health"), PolicyDecision::Allow);
        assert_eq!(engine.evaluate(&ctx, "status"), PolicyDecision::Neutral);
    }

    #[test]
    fn test_add_and_remove() {
        let engine = PolicyEngine::new();
        engine.add_policy(Policy::deny("p").with_id("p1")).unwrap();
        assert_eq!(
            engine.add_policy(Policy::allow("q").with_id("p1")).unwrap_err(),
            PolicyError::DuplicateId("p1".to_string())
        );
        assert!(matches!(
            engine.add_policy(Policy::allow("bad").with_resources([""])),
            Err(PolicyError::InvalidPattern { .. })
        ));
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.get_policy("p1").unwrap().name, "p");

        assert!(engine.remove_policy("p1"));
        assert!(!engine.remove_policy("p1"));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = Policy::allow("a");
        let b = Policy::allow("a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_document_round_trip() {
        let doc: PolicyDocument = serde_json::from_value(json!({
            "id": "guest-read-only",
            "name": "No writes by guests",
            "effect": "deny",
            "actions": ["create", "update", "delete"],
            "conditions": [
                {"type": "attribute", "path": "user.roles", "operator": "contains", "value": "guest"}
            ],
            "priority": 200
        }))
        .unwrap();
        assert_eq!(doc.resources, ["*"]);

        let policy = Policy::try_from(doc.clone()).unwrap();
        assert_eq!(policy.id, "guest-read-only");
        assert_eq!(policy.effect, PolicyEffect::Deny);
        assert_eq!(policy.to_document(), doc);

        let engine = PolicyEngine::new();
        engine.add_policy(policy).unwrap();
        let guest = PermissionContext::new("g").with_roles(["guest"]);
        assert_eq!(engine.evaluate(&guest, "posts:update"), PolicyDecision::Deny);
        assert_eq!(engine.evaluate(&guest, "posts:read"), PolicyDecision::Neutral);
    }
}
