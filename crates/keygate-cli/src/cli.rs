use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "keygate")]
#[command(about = "Keygate CLI - run access decisions against a bootstrap file")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Bootstrap file with auth settings, clients, roles and policies
    #[arg(
        short,
        long,
        global = true,
        env = "KEYGATE_CONFIG",
        default_value = "keygate.toml"
    )]
    pub config: String,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decide whether a user may perform a permission (exit 2 when denied)
    Check(CheckArgs),
    /// Inspect roles
    Roles(RolesArgs),
    /// Inspect policies
    Policies(PoliciesArgs),
    /// Inspect registered clients
    Clients(ClientsArgs),
    /// Validate the bootstrap file
    Validate,
}

#[derive(clap::Args)]
pub struct CheckArgs {
    /// User id
    #[arg(short, long)]
    pub user: String,
    /// Comma-separated role names
    #[arg(short, long, value_delimiter = ',')]
    pub roles: Vec<String>,
    /// Permission to check (e.g. documents:read)
    #[arg(short, long)]
    pub permission: String,
    /// Resource type of the target resource
    #[arg(long)]
    pub resource_type: Option<String>,
    /// Id of the target resource
    #[arg(long, requires = "resource_type")]
    pub resource_id: Option<String>,
    /// Owner of the target resource
    #[arg(long, requires = "resource_type")]
    pub owner: Option<String>,
    /// Resource attributes as key=value pairs (values parsed as JSON when possible)
    #[arg(long = "attr", requires = "resource_type")]
    pub attributes: Vec<String>,
}

#[derive(clap::Args)]
pub struct RolesArgs {
    #[command(subcommand)]
    pub command: RolesCommands,
}

#[derive(Subcommand)]
pub enum RolesCommands {
    /// List roles
    List,
    /// Show a role with its resolved permissions
    Show(RoleShowArgs),
}

#[derive(clap::Args)]
pub struct RoleShowArgs {
    /// Role name
    pub name: String,
}

#[derive(clap::Args)]
pub struct PoliciesArgs {
    #[command(subcommand)]
    pub command: PoliciesCommands,
}

#[derive(Subcommand)]
pub enum PoliciesCommands {
    /// List policies in evaluation order
    List,
}

#[derive(clap::Args)]
pub struct ClientsArgs {
    #[command(subcommand)]
    pub command: ClientsCommands,
}

#[derive(Subcommand)]
pub enum ClientsCommands {
    /// List clients
    List,
}
