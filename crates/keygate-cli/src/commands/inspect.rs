use anyhow::Result;
use keygate_auth::AuthCore;
use keygate_auth::policy::PolicyDocument;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::output::{self, join_or_dash, print_field};

pub fn list_roles(core: &AuthCore, format: OutputFormat) -> Result<()> {
    let roles = core.roles().list_roles();
    match format {
        OutputFormat::Json => output::print_json(&roles)?,
        OutputFormat::Table => output::print_table(
            &["Name", "Priority", "System", "Inherits", "Permissions"],
            roles.iter().map(|role| {
                [
                    role.name.clone(),
                    role.priority.to_string(),
                    role.is_system.to_string(),
                    join_or_dash(&role.inherits),
                    join_or_dash(&role.permissions),
                ]
            }),
        ),
    }
    Ok(())
}

#[derive(Serialize)]
struct ResolvedRole<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    inherits: &'a [String],
    permissions: Vec<String>,
}

pub fn show_role(core: &AuthCore, name: &str, format: OutputFormat) -> Result<()> {
    let Some(role) = core.roles().get_role(name) else {
        anyhow::bail!("Unknown role: {name}");
    };
    let mut permissions: Vec<String> = core
        .roles()
        .get_role_permissions(name)
        .iter()
        .cloned()
        .collect();
    permissions.sort();

    let resolved = ResolvedRole {
        name: &role.name,
        description: role.description.as_deref(),
        inherits: &role.inherits,
        permissions,
    };
    match format {
        OutputFormat::Json => output::print_json(&resolved)?,
        OutputFormat::Table => {
            print_field("Role", resolved.name);
            if let Some(description) = resolved.description {
                print_field("Description", description);
            }
            print_field("Inherits", join_or_dash(resolved.inherits));
            output::print_table(
                &["Permission", "Direct"],
                resolved.permissions.iter().map(|p| {
                    [p.clone(), role.has_direct_permission(p).to_string()]
                }),
            );
        }
    }
    Ok(())
}

pub fn list_policies(core: &AuthCore, format: OutputFormat) -> Result<()> {
    let policies = core.policies().list_policies();
    match format {
        OutputFormat::Json => {
            let documents: Vec<PolicyDocument> =
                policies.iter().map(|p| p.to_document()).collect();
            output::print_json(&documents)?;
        }
        OutputFormat::Table => output::print_table(
            &["Priority", "Effect", "Name", "Resources", "Actions", "Conditions"],
            policies.iter().map(|policy| {
                [
                    policy.priority.to_string(),
                    policy.effect.to_string(),
                    policy.name.clone(),
                    join_or_dash(&policy.resources),
                    join_or_dash(&policy.actions),
                    join_or_dash(policy.conditions.iter().map(ToString::to_string)),
                ]
            }),
        ),
    }
    Ok(())
}

pub fn list_clients(core: &AuthCore, format: OutputFormat) -> Result<()> {
    let clients = core.clients().list();
    match format {
        OutputFormat::Json => output::print_json(&clients)?,
        OutputFormat::Table => output::print_table(
            &["Client ID", "Type", "Grants", "Scopes", "PKCE", "Active"],
            clients.iter().map(|client| {
                [
                    client.client_id.clone(),
                    client.client_type.to_string(),
                    join_or_dash(client.grant_types.iter().map(|g| g.as_str())),
                    join_or_dash(&client.scopes),
                    client.pkce_required.to_string(),
                    client.active.to_string(),
                ]
            }),
        ),
    }
    Ok(())
}
