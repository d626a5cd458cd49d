//! Switchboard CLI entry point.

use anyhow::Context;
use clap::Parser;

use switchboard::cli::commands::{self, load_config};
use switchboard::cli::{handle_error, Cli, Commands};
use switchboard::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        handle_error(err, json);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let log_config = LogConfig::try_from(&config.logging).context("Invalid logging configuration")?;
    let _logger = LoggerImpl::init(&log_config)?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, &config, cli.json).await,
        Commands::Subscriptions => commands::subscriptions::execute(cli.json),
        Commands::Rules(args) => commands::rules::execute(args, &config, cli.json).await,
        Commands::Memory(args) => commands::memory::execute(args, &config, cli.json).await,
        Commands::Status => commands::status::execute(&config, cli.json).await,
    }
}
