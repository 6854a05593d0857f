//! Harvest CLI - collects native runtime binaries from vcpkg

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::GlobalOpts;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("harvest=debug")
    } else {
        EnvFilter::new("harvest=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let global = GlobalOpts {
        config: cli.config,
        color: !cli.no_color && std::io::stderr().is_terminal(),
    };

    // Execute command
    match cli.command {
        Commands::Run(args) => commands::run::execute(args, &global),
        Commands::Plan(args) => commands::plan::execute(args, &global),
        Commands::Scan(args) => commands::scan::execute(args, &global),
        Commands::Info(args) => commands::info::execute(args, &global),
    }
}
