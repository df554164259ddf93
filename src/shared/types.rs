//! Common types used across the application

use serde::{Deserialize, Serialize};

/// Settlement currency every position is measured in
pub const SETTLEMENT_CURRENCY: &str = "USDT";

/// Native gas token of the settlement chain
pub const NATIVE_TOKEN: &str = "SOL";

/// Trade direction between the two venues.
///
/// Exactly one direction is executable at any time, determined by where
/// the settlement currency currently resides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Buy on the CEX, withdraw to the chain, sell via the aggregator
    CexToChain,
    /// Buy via the aggregator, deposit to the CEX, sell on the CEX
    ChainToCex,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::CexToChain => "cex->chain",
            Direction::ChainToCex => "chain->cex",
        }
    }

    /// Venue the capital starts at
    pub fn source(&self) -> &'static str {
        match self {
            Direction::CexToChain => "cex",
            Direction::ChainToCex => "chain",
        }
    }

    pub fn destination(&self) -> &'static str {
        match self {
            Direction::CexToChain => "chain",
            Direction::ChainToCex => "cex",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CEX sub-ledger an asset balance lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountScope {
    /// Trading account
    Unified,
    /// Funding account (deposits land here, withdrawals leave from here)
    Fund,
}

impl AccountScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountScope::Unified => "UNIFIED",
            AccountScope::Fund => "FUND",
        }
    }
}

/// Order side for CEX market orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "Buy",
            OrderSide::Sell => "Sell",
        }
    }
}

/// Unit the order amount is denominated in.
///
/// Market buys commit a quote amount (USDT), market sells commit a base
/// quantity (the coin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmountUnit {
    Base,
    Quote,
}
