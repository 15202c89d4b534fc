mod cli;
mod commands;
mod history;
mod observability;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    observability::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Shell { env } => {
            let runtime = commands::docker_runtime()?;
            commands::shell::run_shell(&env, cli.json, cli.keep_staging, runtime)?;
        }
        Commands::Exec { env, command } => {
            let runtime = commands::docker_runtime()?;
            let code =
                commands::exec::exec_once(&env, &command, cli.json, cli.keep_staging, runtime)?;
            if code != 0 {
                std::process::exit(i32::try_from(code).unwrap_or(1));
            }
        }
        Commands::Concentrate { paths, boundary } => {
            let roots = commands::concentrate::concentrate_paths(&paths, boundary.as_deref())?;
            commands::concentrate::print_roots(&roots, cli.json)?;
        }
    }

    Ok(())
}
