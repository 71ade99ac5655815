use anyhow::{Context, Result};
use clap::Parser;

use mdlive::Settings;
use mdlive::cli::commands::{cat, init, view};
use mdlive::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("cannot load configuration from {}", path.display()))?,
        None => Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            eprintln!("Using default configuration.");
            Settings::default()
        }),
    };

    mdlive::logging::init_with_config(&config.logging);

    match cli.command {
        Commands::Init { force } => init::run_init(force),
        Commands::Config => init::run_config(&config),
        Commands::Cat { file, host } => cat::run(&file, host, config).await,
        Commands::View(args) => view::run(args, config).await,
    }
}
