//! metacontrol CLI entry point.

use anyhow::Result;
use clap::Parser;

use metacontrol::cli::{self, commands, Cli, Commands};
use metacontrol::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    if let Err(err) = dispatch(cli).await {
        cli::handle_error(err, json_mode);
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => {
            let config = cli::load_config(cli.config.as_deref())?;
            let _logger = LoggerImpl::init(&config.logging)?;
            commands::run::execute(args, config, cli.json).await
        }
        Commands::Config(args) => commands::config::execute(args, cli.config.as_deref(), cli.json),
    }
}
