use std::collections::HashSet;

use keygate_auth::policy::{Policy, compile_glob};
use keygate_auth::rbac::RoleGraph;

use crate::config::BootstrapFile;
use crate::output::{print_error, print_success, print_warning};

/// Checks every section of the file and reports all problems, not just the
/// first. Returns the number of errors.
pub fn validate(file: &BootstrapFile) -> usize {
    let problems = collect_problems(file);
    for warning in &problems.warnings {
        print_warning(warning);
    }
    for error in &problems.errors {
        print_error(error);
    }
    if problems.errors.is_empty() {
        print_success(&format!(
            "Valid: {} clients, {} roles, {} policies",
            file.clients.len(),
            file.roles.len(),
            file.policies.len()
        ));
    }
    problems.errors.len()
}

#[derive(Debug, Default)]
struct Problems {
    errors: Vec<String>,
    warnings: Vec<String>,
}

fn collect_problems(file: &BootstrapFile) -> Problems {
    let mut problems = Problems::default();

    if let Err(e) = file.auth.validate() {
        problems.errors.push(format!("auth: {e}"));
    }

    let mut client_ids = HashSet::new();
    for client in &file.clients {
        if let Err(e) = client.validate() {
            problems
                .errors
                .push(format!("client '{}': {e}", client.client_id));
        }
        if !client_ids.insert(client.client_id.as_str()) {
            problems
                .errors
                .push(format!("client '{}': duplicate client id", client.client_id));
        }
    }

    let graph = if file.auth.rbac.bootstrap_system_roles {
        RoleGraph::with_system_roles()
    } else {
        RoleGraph::new()
    };
    for role in &file.roles {
        if let Err(e) = graph.add_role(role.clone()) {
            problems.errors.push(format!("role '{}': {e}", role.name));
        }
    }
    for role in &file.roles {
        for parent in &role.inherits {
            if graph.get_role(parent).is_none() {
                problems.warnings.push(format!(
                    "role '{}': inherits unknown role '{parent}'",
                    role.name
                ));
            }
        }
    }

    let mut policy_ids = HashSet::new();
    for document in &file.policies {
        match Policy::try_from(document.clone()) {
            Ok(policy) => {
                for pattern in policy.resources.iter().chain(&policy.actions) {
                    if let Err(e) = compile_glob(pattern) {
                        problems.errors.push(format!("policy '{}': {e}", policy.name));
                    }
                }
                if !policy_ids.insert(policy.id.clone()) {
                    problems
                        .errors
                        .push(format!("policy '{}': duplicate id '{}'", policy.name, policy.id));
                }
            }
            Err(e) => problems
                .errors
                .push(format!("policy '{}': {e}", document.name)),
        }
    }

    problems
}
