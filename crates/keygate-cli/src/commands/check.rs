use anyhow::{Context, Result};
use colored::Colorize;
use keygate_auth::policy::{PermissionContext, ResourceDescriptor};
use keygate_auth::{AccessDecision, AuthCore};
use serde_json::Value;

use crate::cli::{CheckArgs, OutputFormat};
use crate::output::{self, print_field};

/// Runs one access decision. Returns whether access was granted.
pub fn check(core: &AuthCore, args: &CheckArgs, format: OutputFormat) -> Result<bool> {
    let ctx = context_from_args(args)?;
    let decision = core.access().check_access_detailed(&ctx, &args.permission);

    match format {
        OutputFormat::Json => output::print_json(&decision)?,
        OutputFormat::Table => print_decision(&args.permission, &decision),
    }
    Ok(decision.allowed)
}

fn print_decision(permission: &str, decision: &AccessDecision) {
    let verdict = if decision.allowed {
        "ALLOW".green().bold()
    } else {
        "DENY".red().bold()
    };
    print_field("Permission", permission);
    print_field("Decision", verdict);
    print_field("Roles grant", decision.rbac_granted);
    print_field("Policy", decision.policy.decision);
    if let Some(name) = &decision.policy.policy_name {
        print_field(
            "Matched policy",
            format!(
                "{name} ({})",
                decision.policy.policy_id.as_deref().unwrap_or("-")
            ),
        );
    }
}

fn context_from_args(args: &CheckArgs) -> Result<PermissionContext> {
    let roles = args.roles.iter().map(|r| r.trim()).filter(|r| !r.is_empty());
    let mut ctx = PermissionContext::new(args.user.as_str()).with_roles(roles);

    if let Some(resource_type) = &args.resource_type {
        let mut resource = ResourceDescriptor::new(resource_type.as_str());
        if let Some(id) = &args.resource_id {
            resource = resource.with_id(id.as_str());
        }
        if let Some(owner) = &args.owner {
            resource = resource.with_owner(owner.as_str());
        }
        for pair in &args.attributes {
            let (key, value) = parse_attribute(pair)?;
            resource = resource.with_attribute(key, value);
        }
        ctx = ctx.with_resource(resource);
    }
    Ok(ctx)
}

fn parse_attribute(pair: &str) -> Result<(String, Value)> {
    let (key, raw) = pair
        .split_once('=')
        .with_context(|| format!("Attribute '{pair}' must be key=value"))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Attribute '{pair}' has an empty key");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_attribute() {
        assert_eq!(
            parse_attribute("status=draft").unwrap(),
            ("status".to_string(), json!("draft"))
        );
        assert_eq!(
            parse_attribute("size=42").unwrap(),
            ("size".to_string(), json!(42))
        );
        assert_eq!(
            parse_attribute("tags=[\"a\"]").unwrap(),
            ("tags".to_string(), json!(["a"]))
        );
        assert!(parse_attribute("novalue").is_err());
        assert!(parse_attribute("=x").is_err());
    }

    #[test]
    fn test_context_from_args() {
        let args = CheckArgs {
            user: "u1".into(),
            roles: vec!["editor".into(), " ".into()],
            permission: "documents:update".into(),
            resource_type: Some("documents".into()),
            resource_id: Some("d1".into()),
            owner: Some("u1".into()),
            attributes: vec!["status=draft".into()],
        };
        let ctx = context_from_args(&args).unwrap();
        assert_eq!(ctx.roles, ["editor"]);
        assert!(ctx.is_owner());
        let resource = ctx.resource.unwrap();
        assert_eq!(resource.id.as_deref(), Some("d1"));
        assert_eq!(resource.attributes["status"], json!("draft"));
    }
}
