//! tv - taskvault command line client
//!
//! Creates projects, edits their task trees and knowledge bases, and imports
//! agent todo lists, all on top of `taskvault-core`.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;
mod config;
mod output;
mod todo_sync;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing; logs go to stderr so command output stays clean
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("taskvault=info,taskvault_core=info")),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = config::Config::load()?;
    if !config.output.color {
        colored::control::set_override(false);
    }

    // Execute command
    match cli.command {
        Commands::Project(cmd) => commands::project::execute(cmd, &config, cli.json),
        Commands::Task(cmd) => commands::task::execute(cmd, &config, cli.json),
        Commands::Knowledge(cmd) => commands::knowledge::execute(cmd, &config, cli.json),
        Commands::Import {
            path,
            project,
            dry_run,
            backup,
        } => commands::import::execute(&path, &project, dry_run, backup, &config, cli.json),
        Commands::Version => {
            println!("tv {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
