mod cli;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::{ClientsCommands, Cli, Commands, PoliciesCommands, RolesCommands};
use output::print_error;

/// Exit status for a denied `check`.
const EXIT_DENIED: i32 = 2;

fn main() {
    match run() {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            print_error(&format!("{e:#}"));
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let format = cli.format.unwrap_or_default();

    let file = config::load_bootstrap(&cli.config)?;

    if let Commands::Validate = cli.command {
        let errors = commands::validate::validate(&file);
        return Ok(i32::from(errors > 0));
    }

    let core = config::build_core(file)?;
    match &cli.command {
        Commands::Check(args) => {
            let allowed = commands::check::check(&core, args, format)?;
            if !allowed {
                return Ok(EXIT_DENIED);
            }
        }
        Commands::Roles(args) => match &args.command {
            RolesCommands::List => commands::inspect::list_roles(&core, format)?,
            RolesCommands::Show(show) => commands::inspect::show_role(&core, &show.name, format)?,
        },
        Commands::Policies(args) => match &args.command {
            PoliciesCommands::List => commands::inspect::list_policies(&core, format)?,
        },
        Commands::Clients(args) => match &args.command {
            ClientsCommands::List => commands::inspect::list_clients(&core, format)?,
        },
        // handled before the core is built
        Commands::Validate => {}
    }

    Ok(0)
}

fn init_tracing(level: &str) {
    // RUST_LOG wins over --log-level
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
