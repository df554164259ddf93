//! CLI commands and handlers

use clap::{Parser, Subcommand};
use tracing::info;

use crate::application::services::ArbitrageService;
use crate::domain::funds::Location;
use crate::shared::errors::AppError;
use crate::shared::utils::format_usdt;

#[derive(Parser)]
#[command(name = "crossarb")]
#[command(about = "CEX <-> Solana DEX arbitrage bot")]
pub struct Cli {
    /// Path to the config file
    #[arg(long, default_value = "Config.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show where the capital currently resides
    Locate,

    /// Scan the feasible direction for the best opportunity
    Scan,

    /// Run the locate-scan-execute loop
    Run {
        /// Seconds between rounds
        #[arg(short, long, default_value_t = 30)]
        interval: u64,

        /// Stop after this many rounds (default: run until interrupted)
        #[arg(short = 'n', long)]
        iterations: Option<u32>,

        /// Execute trades instead of only reporting them
        #[arg(long)]
        execute: bool,
    },

    /// Sweep the settlement currency to one venue (cex or chain)
    Consolidate {
        #[arg(long)]
        to: String,
    },
}

pub struct CommandExecutor;

impl CommandExecutor {
    /// Execute the selected command
    pub async fn execute(command: Commands, service: ArbitrageService) -> Result<(), AppError> {
        match command {
            Commands::Locate => {
                let location = service.locate().await?;
                info!(
                    "📍 Capital is {} (cex: {}, chain: {}, total: {})",
                    location.location.as_str(),
                    format_usdt(location.cex_usdt),
                    format_usdt(location.chain_usdt),
                    format_usdt(location.total())
                );
                Ok(())
            }
            Commands::Scan => {
                match service.scan_feasible().await? {
                    Some(opp) => {
                        info!(
                            "💰 {} ({}): projected profit ${:.2} on ${:.2}",
                            opp.coin, opp.direction, opp.expected_profit, opp.capital
                        );
                        info!(
                            "   cex=${:.6} dex=${:.6} slip={:.3}% costs=${:.2}",
                            opp.cex_price,
                            opp.dex_price,
                            opp.cex_slippage * 100.0,
                            opp.costs.total()
                        );
                    }
                    None => info!("⏳ No opportunity above the configured threshold"),
                }
                Ok(())
            }
            Commands::Run {
                interval,
                iterations,
                execute,
            } => service.run_loop(interval, iterations, execute).await,
            Commands::Consolidate { to } => {
                let target = match to.to_lowercase().as_str() {
                    "cex" => Location::Cex,
                    "chain" => Location::Chain,
                    other => {
                        return Err(AppError::ConfigError(format!(
                            "unknown consolidation target '{}', expected cex or chain",
                            other
                        )))
                    }
                };
                service.consolidate(target).await
            }
        }
    }
}
