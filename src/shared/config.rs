//! Configuration loading from Config.toml

use std::{fs, path::Path};

use serde::Deserialize;

use crate::shared::errors::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct CexCfg {
    pub api_base: String,
    pub api_key: String,
    pub api_secret: String,
    /// Proportional taker fee on spot market orders
    pub fee_rate: f64,
    #[serde(default = "default_recv_window")]
    pub recv_window: u64,
}

fn default_recv_window() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexCfg {
    pub quote_api_base: String,
    /// Fixed slippage tolerance applied to the aggregator leg when the
    /// capital starts at the CEX (the deposit is in flight for minutes,
    /// so this side is budgeted more conservatively)
    pub slippage_outbound: f64,
    /// Fixed slippage tolerance on the aggregator buy leg when the
    /// capital starts on chain
    pub slippage_inbound: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainCfg {
    pub rpc_url: String,
    /// Base58-encoded wallet secret key
    pub secret_key: String,
    /// Flat settlement-chain transaction cost, in USDT
    pub settlement_cost: f64,
    /// SOL kept back for transaction fees, never transferred
    #[serde(default = "default_fee_reserve")]
    pub fee_reserve_sol: f64,
}

fn default_fee_reserve() -> f64 {
    0.01
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeCfg {
    /// Candidate coins to scan, in priority order
    pub candidates: Vec<String>,
    /// Minimum projected profit (USDT) before a trade is taken
    pub min_profit_threshold: f64,
    /// Orderbook depth fetched for slippage estimation
    #[serde(default = "default_orderbook_depth")]
    pub orderbook_depth: u32,
}

fn default_orderbook_depth() -> u32 {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundsCfg {
    /// Balance below this is treated as dust when classifying where the
    /// capital lives, in USDT
    #[serde(default = "default_presence_threshold")]
    pub presence_threshold: f64,
}

fn default_presence_threshold() -> f64 {
    10.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementCfg {
    /// Seconds between destination-balance polls
    pub poll_interval_secs: u64,
    /// Hard cap on poll iterations before the attempt aborts
    pub max_polls: u32,
    /// Seconds to wait after the deposit is confirmed before trading it
    pub grace_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceCfg {
    /// Path to the CEX/aggregator token overlap file
    pub overlap_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub cex: CexCfg,
    pub dex: DexCfg,
    pub chain: ChainCfg,
    pub trade: TradeCfg,
    pub funds: FundsCfg,
    pub settlement: SettlementCfg,
    pub reference: ReferenceCfg,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::ConfigError(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<Self, AppError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.trade.min_profit_threshold <= 0.0 {
            return Err(AppError::ConfigError(format!(
                "trade.min_profit_threshold must be strictly positive, got {}",
                self.trade.min_profit_threshold
            )));
        }
        if self.trade.candidates.is_empty() {
            return Err(AppError::ConfigError(
                "trade.candidates must not be empty".to_string(),
            ));
        }
        if self.settlement.max_polls == 0 {
            return Err(AppError::ConfigError(
                "settlement.max_polls must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [cex]
        api_base = "https://api.bybit.com"
        api_key = "key"
        api_secret = "secret"
        fee_rate = 0.001

        [dex]
        quote_api_base = "https://lite-api.jup.ag/swap/v1"
        slippage_outbound = 0.002
        slippage_inbound = 0.001

        [chain]
        rpc_url = "https://api.mainnet-beta.solana.com"
        secret_key = "placeholder"
        settlement_cost = 0.05

        [trade]
        candidates = ["SOL", "JUP"]
        min_profit_threshold = 0.5

        [funds]
        presence_threshold = 10.0

        [settlement]
        poll_interval_secs = 15
        max_polls = 80
        grace_secs = 5

        [reference]
        overlap_file = "files/overlap.json"
    "#;

    #[test]
    fn parses_sample_config() {
        let cfg = Config::from_str(SAMPLE).unwrap();
        assert_eq!(cfg.trade.candidates, vec!["SOL", "JUP"]);
        assert_eq!(cfg.cex.recv_window, 5000);
        assert_eq!(cfg.chain.fee_reserve_sol, 0.01);
        assert_eq!(cfg.trade.orderbook_depth, 20);
    }

    #[test]
    fn rejects_non_positive_threshold() {
        let bad = SAMPLE.replace("min_profit_threshold = 0.5", "min_profit_threshold = 0.0");
        assert!(Config::from_str(&bad).is_err());
    }
}
