use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use keygate_auth::policy::{Policy, PolicyDocument};
use keygate_auth::rbac::Role;
use keygate_auth::types::ClientRegistration;
use keygate_auth::{AuthConfig, AuthCore};
use serde::Deserialize;

/// Everything `keygate` needs to stand up an in-memory core.
///
/// ```toml
/// [auth.oauth]
/// access_token_lifetime = "15m"
///
/// [[clients]]
/// client_id = "portal"
/// secret = "change-me"
/// redirect_uris = ["https://portal.example/cb"]
/// scopes = ["read"]
///
/// [[roles]]
/// name = "editor"
/// permissions = ["documents:*"]
/// inherits = ["user"]
///
/// [[policies]]
/// name = "owners edit"
/// effect = "allow"
/// resources = ["documents"]
/// actions = ["update"]
/// conditions = [{ type = "ownership" }]
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BootstrapFile {
    pub auth: AuthConfig,
    pub clients: Vec<ClientRegistration>,
    pub roles: Vec<Role>,
    pub policies: Vec<PolicyDocument>,
}

/// Loads the bootstrap file. `KEYGATE__AUTH__OAUTH__ACCESS_TOKEN_LIFETIME=5m`
/// style variables override file values.
pub fn load_bootstrap(path: &str) -> Result<BootstrapFile> {
    let pathbuf = PathBuf::from(path);
    if !pathbuf.exists() {
        anyhow::bail!(
            "Bootstrap file not found: {path}. Use --config or set KEYGATE_CONFIG"
        );
    }

    let cfg = Config::builder()
        .add_source(File::from(pathbuf).format(FileFormat::Toml))
        .add_source(
            Environment::with_prefix("KEYGATE")
                .try_parsing(true)
                .separator("__"),
        )
        .build()
        .with_context(|| format!("Failed to read {path}"))?;

    let file: BootstrapFile = cfg
        .try_deserialize()
        .with_context(|| format!("Invalid bootstrap file {path}"))?;
    tracing::debug!(
        path,
        clients = file.clients.len(),
        roles = file.roles.len(),
        policies = file.policies.len(),
        "loaded bootstrap file"
    );
    Ok(file)
}

/// Builds a core and loads every client, role and policy into it. Fails on
/// the first invalid entry.
pub fn build_core(file: BootstrapFile) -> Result<AuthCore> {
    let core = AuthCore::from_config(file.auth).context("Invalid auth configuration")?;
    let now = time::OffsetDateTime::now_utc();

    for registration in file.clients {
        let client_id = registration.client_id.clone();
        core.clients()
            .register(registration, now)
            .with_context(|| format!("Client '{client_id}'"))?;
    }

    for role in file.roles {
        let name = role.name.clone();
        core.roles()
            .add_role(role)
            .with_context(|| format!("Role '{name}'"))?;
    }

    for document in file.policies {
        let name = document.name.clone();
        let policy = Policy::try_from(document).with_context(|| format!("Policy '{name}'"))?;
        core.policies()
            .add_policy(policy)
            .with_context(|| format!("Policy '{name}'"))?;
    }

    Ok(core)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const BOOTSTRAP: &str = r#"
[auth.oauth]
access_token_lifetime = "15m"
refresh_token_rotation = true

[[clients]]
client_id = "portal"
secret = "s1"
redirect_uris = ["https://portal.example/cb"]
scopes = ["read", "write"]

[[clients]]
client_id = "spa"
client_type = "public"
redirect_uris = ["https://spa.example/cb"]
pkce_required = true

[[roles]]
name = "editor"
permissions = ["documents:*"]
inherits = ["user"]

[[policies]]
id = "freeze"
name = "archive is frozen"
effect = "deny"
resources = ["archive"]
priority = 100

[[policies]]
name = "owners edit"
effect = "allow"
resources = ["documents"]
actions = ["update"]
conditions = [{ type = "ownership" }]
"#;

    fn write(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("keygate.toml");
        fs::write(&path, contents).expect("write toml");
        let path = path.to_str().expect("utf-8 path").to_string();
        (dir, path)
    }

    #[test]
    fn test_load_and_build() {
        let (_dir, path) = write(BOOTSTRAP);
        let file = load_bootstrap(&path).unwrap();
        assert_eq!(file.clients.len(), 2);
        assert_eq!(file.roles.len(), 1);
        assert_eq!(file.policies.len(), 2);
        assert_eq!(
            file.auth.oauth.access_token_lifetime,
            std::time::Duration::from_secs(900)
        );
        assert!(file.auth.oauth.refresh_token_rotation);

        let core = build_core(file).unwrap();
        assert_eq!(core.clients().len(), 2);
        assert_eq!(core.roles().len(), 5);
        assert!(core.roles().has_permission(&["editor"], "profile:read"));
        assert_eq!(core.policies().list_policies()[0].id, "freeze");
    }

    #[test]
    fn test_missing_file() {
        let err = load_bootstrap("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_invalid_client_named_in_error() {
        let (_dir, path) = write(
            r#"
[[clients]]
client_id = "broken"
redirect_uris = ["https://x/cb"]
"#,
        );
        let file = load_bootstrap(&path).unwrap();
        let err = build_core(file).unwrap_err();
        assert!(format!("{err:#}").contains("broken"));
    }
}
