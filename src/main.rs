use anyhow::Result;
use clap::Parser;

use crossarb::application::{ArbitrageService, Cli, CommandExecutor};
use crossarb::shared::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?;
    let service = ArbitrageService::from_config(config)?;
    CommandExecutor::execute(cli.command, service).await?;
    Ok(())
}
