use keygate_auth::policy::{
    AttributeOperator, Condition, Policy, PolicyDecision, PolicyDocument, ResourceDescriptor,
};
use keygate_auth::rbac::Role;
use keygate_auth::{AuthConfig, AuthCore, PermissionContext};
use serde_json::json;

fn core() -> AuthCore {
    AuthCore::from_config(AuthConfig::default()).expect("valid config")
}

#[test]
fn cyclic_inheritance_terminates() {
    let core = core();
    let roles = core.roles();
    roles
        .add_role(Role::builder("a").permission("x:read").inherits("b").build())
        .expect("add a");
    roles
        .add_role(Role::builder("b").permission("y:read").inherits("a").build())
        .expect("add b");

    let permissions = roles.get_user_permissions(&["a"]);
    assert!(permissions.contains("x:read"));
    assert!(permissions.contains("y:read"));
    assert!(roles.has_permission(&["b"], "x:read"));
    assert!(!roles.has_permission(&["b"], "z:read"));
}

#[test]
fn inherited_permissions_follow_role_updates() {
    let core = core();
    let roles = core.roles();
    roles
        .add_role(Role::builder("editor").permission("posts:write").inherits("user").build())
        .expect("add editor");
    assert!(roles.has_permission(&["editor"], "profile:read"));

    roles
        .add_role(Role::builder("user").permission("feed:read").build())
        .expect("replace user");
    assert!(!roles.has_permission(&["editor"], "profile:read"));
    assert!(roles.has_permission(&["editor"], "feed:read"));
}

#[test]
fn higher_priority_deny_beats_allow() {
    let core = core();
    core.policies()
        .add_policy(Policy::allow("open").with_resources(["reports"]).with_priority(50))
        .expect("add allow");
    core.policies()
        .add_policy(
            Policy::deny("closed")
                .with_resources(["reports"])
                .with_actions(["delete"])
                .with_priority(100),
        )
        .expect("add deny");

    let ctx = PermissionContext::new("u1").with_roles(["admin"]);
    assert_eq!(
        core.policies().evaluate(&ctx, "reports:delete"),
        PolicyDecision::Deny
    );
    assert!(!core.access().check_access(&ctx, "reports:delete"));
    assert!(core.access().check_access(&ctx, "reports:read"));
}

#[test]
fn equal_priority_keeps_insertion_order() {
    let core = core();
    core.policies()
        .add_policy(Policy::allow("first").with_resources(["docs"]))
        .expect("add first");
    core.policies()
        .add_policy(Policy::deny("second").with_resources(["docs"]))
        .expect("add second");

    let ctx = PermissionContext::new("u1");
    let evaluation = core.policies().evaluate_with_trace(&ctx, "docs:read");
    assert_eq!(evaluation.decision, PolicyDecision::Allow);
    assert_eq!(evaluation.policy_name.as_deref(), Some("first"));
}

#[test]
fn attribute_policy_from_document() {
    let core = core();
    let document: PolicyDocument = serde_json::from_value(json!({
        "id": "public-docs",
        "name": "public documents are readable",
        "effect": "allow",
        "resources": ["docs"],
        "actions": ["read"],
        "conditions": [
            { "type": "attribute", "path": "resource.attributes.visibility", "operator": "equals", "value": "public" }
        ]
    }))
    .expect("policy document");
    core.policies()
        .add_policy(Policy::try_from(document).expect("compile"))
        .expect("add policy");

    let public = PermissionContext::new("guest-user").with_resource(
        ResourceDescriptor::new("docs").with_attribute("visibility", json!("public")),
    );
    let private = PermissionContext::new("guest-user").with_resource(
        ResourceDescriptor::new("docs").with_attribute("visibility", json!("private")),
    );
    assert!(core.access().can_access_resource(&public, "read"));
    assert!(!core.access().can_access_resource(&private, "read"));
}

#[test]
fn no_roles_and_no_policies_deny() {
    let core = core();
    let ctx = PermissionContext::new("nobody");
    let decision = core.access().check_access_detailed(&ctx, "anything:read");
    assert!(!decision.allowed);
    assert!(!decision.rbac_granted);
    assert_eq!(decision.policy.decision, PolicyDecision::Neutral);
}

#[test]
fn ownership_condition_with_regex_attribute() {
    let core = core();
    core.policies()
        .add_policy(
            Policy::allow("own drafts")
                .with_resources(["posts"])
                .with_actions(["update", "delete"])
                .with_condition(Condition::Ownership)
                .with_condition(
                    Condition::attribute(
                        "resource.attributes.status",
                        AttributeOperator::Matches,
                        json!("^draft"),
                    )
                    .expect("valid regex"),
                ),
        )
        .expect("add policy");

    let draft = PermissionContext::new("u1").with_resource(
        ResourceDescriptor::new("posts")
            .with_owner("u1")
            .with_attribute("status", json!("draft-2")),
    );
    assert!(core.access().can_access_resource(&draft, "delete"));

    let someone_else = PermissionContext::new("u2").with_resource(
        ResourceDescriptor::new("posts")
            .with_owner("u1")
            .with_attribute("status", json!("draft-2")),
    );
    assert!(!core.access().can_access_resource(&someone_else, "delete"));
}
