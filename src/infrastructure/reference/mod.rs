//! Reference data - the CEX/aggregator token overlap
//!
//! One JSON file is the single source of truth for which coins exist on
//! both venues, their mints and decimals, and the exchange's fixed
//! withdrawal fee per coin. Loaded once at startup and passed around
//! explicitly; there is no process-wide cache.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::shared::errors::AppError;

#[derive(Debug, Clone, Deserialize)]
struct OverlapEntry {
    symbol: String,
    name: String,
    #[serde(rename = "contractAddress")]
    contract_address: String,
    decimals: u8,
    bybit: Option<ExchangeListing>,
}

#[derive(Debug, Clone, Deserialize)]
struct ExchangeListing {
    #[serde(rename = "withdrawFee")]
    withdraw_fee: Option<String>,
    #[serde(rename = "depositEnabled", default)]
    deposit_enabled: bool,
    #[serde(rename = "withdrawEnabled", default)]
    withdraw_enabled: bool,
}

/// One coin listed on both venues
#[derive(Debug, Clone)]
pub struct TokenEntry {
    pub symbol: String,
    pub name: String,
    /// SPL mint address on the settlement chain
    pub mint: String,
    pub decimals: u8,
    /// Fixed exchange withdrawal fee in coin units, when published
    pub withdrawal_fee: Option<f64>,
    pub deposit_enabled: bool,
    pub withdraw_enabled: bool,
}

/// Token catalog keyed by upper-case symbol
pub struct TokenCatalog {
    tokens: HashMap<String, TokenEntry>,
}

impl TokenCatalog {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::ReferenceError(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, AppError> {
        let entries: Vec<OverlapEntry> = serde_json::from_str(content)
            .map_err(|e| AppError::ReferenceError(format!("Failed to parse overlap data: {}", e)))?;

        let mut tokens = HashMap::new();
        for entry in entries {
            let listing = entry.bybit;
            let withdrawal_fee = listing
                .as_ref()
                .and_then(|l| l.withdraw_fee.as_ref())
                .and_then(|fee| fee.parse::<f64>().ok());
            tokens.insert(
                entry.symbol.to_uppercase(),
                TokenEntry {
                    symbol: entry.symbol.to_uppercase(),
                    name: entry.name,
                    mint: entry.contract_address,
                    decimals: entry.decimals,
                    withdrawal_fee,
                    deposit_enabled: listing.as_ref().map(|l| l.deposit_enabled).unwrap_or(false),
                    withdraw_enabled: listing
                        .as_ref()
                        .map(|l| l.withdraw_enabled)
                        .unwrap_or(false),
                },
            );
        }

        if tokens.is_empty() {
            return Err(AppError::ReferenceError(
                "overlap data contains no tokens".to_string(),
            ));
        }
        Ok(Self { tokens })
    }

    pub fn get(&self, symbol: &str) -> Option<&TokenEntry> {
        self.tokens.get(&symbol.to_uppercase())
    }

    pub fn withdrawal_fee(&self, symbol: &str) -> Option<f64> {
        self.get(symbol).and_then(|entry| entry.withdrawal_fee)
    }

    /// Symbols that can actually be moved between the venues, excluding
    /// the settlement stablecoins themselves
    pub fn transferable_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .tokens
            .values()
            .filter(|t| t.symbol != "USDT" && t.symbol != "USDC")
            .filter(|t| t.deposit_enabled && t.withdraw_enabled)
            .map(|t| t.symbol.clone())
            .collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {
            "symbol": "SOL",
            "name": "Solana",
            "contractAddress": "So11111111111111111111111111111111111111112",
            "decimals": 9,
            "bybit": {
                "withdrawFee": "0.008",
                "depositEnabled": true,
                "withdrawEnabled": true
            }
        },
        {
            "symbol": "USDT",
            "name": "Tether",
            "contractAddress": "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB",
            "decimals": 6,
            "bybit": {
                "withdrawFee": "1",
                "depositEnabled": true,
                "withdrawEnabled": true
            }
        },
        {
            "symbol": "ORPHAN",
            "name": "Not listed on the exchange",
            "contractAddress": "orphanMint11111111111111111111111111111111",
            "decimals": 6
        }
    ]"#;

    #[test]
    fn parses_overlap_data() {
        let catalog = TokenCatalog::from_json(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 3);

        let sol = catalog.get("sol").unwrap();
        assert_eq!(sol.decimals, 9);
        assert_eq!(sol.withdrawal_fee, Some(0.008));
        assert!(sol.withdraw_enabled);
    }

    #[test]
    fn unlisted_tokens_have_no_fee_data() {
        let catalog = TokenCatalog::from_json(SAMPLE).unwrap();
        assert_eq!(catalog.withdrawal_fee("ORPHAN"), None);
        assert!(!catalog.get("ORPHAN").unwrap().deposit_enabled);
    }

    #[test]
    fn transferable_symbols_exclude_stablecoins_and_disabled() {
        let catalog = TokenCatalog::from_json(SAMPLE).unwrap();
        assert_eq!(catalog.transferable_symbols(), vec!["SOL".to_string()]);
    }

    #[test]
    fn empty_catalog_is_an_error() {
        assert!(TokenCatalog::from_json("[]").is_err());
    }
}
