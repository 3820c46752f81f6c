//! Context-aware allow/deny policies.
//!
//! - [`context`] - The per-request [`PermissionContext`]
//! - [`condition`] - Ownership, attribute, time and custom conditions
//! - [`engine`] - Policy ordering and evaluation
//!
//! ```
//! use keygate_auth::policy::{Condition, PermissionContext, Policy, PolicyDecision, PolicyEngine, ResourceDescriptor};
//!
//! let engine = PolicyEngine::new();
//! engine
//!     .add_policy(
//!         Policy::allow("owners may edit")
//!             .with_resources(["documents"])
//!             .with_actions(["update"])
//!             .with_condition(Condition::Ownership),
//!     )
//!     .unwrap();
//!
//! let ctx = PermissionContext::new("u1")
//!     .with_resource(ResourceDescriptor::new("documents").with_owner("u1"));
//! assert_eq!(engine.evaluate(&ctx, "documents:update"), PolicyDecision::Allow);
//! ```

pub mod condition;
pub mod context;
pub mod engine;

pub use condition::{
    AttributeCondition, AttributeOperator, AttributePath, Condition, ConditionDocument,
    CustomCondition, TimeCondition, TimeOperator,
};
pub use context::{Environment, PermissionContext, ResourceDescriptor};
pub use engine::{
    Policy, PolicyDecision, PolicyDocument, PolicyEffect, PolicyEngine, PolicyEvaluation,
    compile_glob,
};

/// Errors from building or registering policies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// A glob or regex operand does not compile.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Policy already exists: {0}")]
    DuplicateId(String),

    /// The attribute path is not one of the known context paths.
    #[error("Unknown attribute path: {0}")]
    UnknownAttributePath(String),
}

impl From<PolicyError> for crate::AuthError {
    fn from(err: PolicyError) -> Self {
        Self::invalid_request(err.to_string())
    }
}
