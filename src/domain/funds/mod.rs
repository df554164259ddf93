//! Funds domain - where does the capital currently live
//!
//! Balances mutate as a side effect of every trade and transfer, so the
//! classification is recomputed on demand and never cached.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::venues::{CexVenue, DexVenue};
use crate::shared::errors::VenueError;
use crate::shared::types::{AccountScope, Direction, SETTLEMENT_CURRENCY};

/// Classification of where the settlement currency resides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    Cex,
    Chain,
    /// Meaningful balances on both venues; execution is blocked until
    /// the capital is consolidated
    Split,
    Empty,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Cex => "cex",
            Location::Chain => "chain",
            Location::Split => "split",
            Location::Empty => "empty",
        }
    }
}

/// Snapshot of the capital position across both venues
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundsLocation {
    pub location: Location,
    pub cex_usdt: f64,
    pub chain_usdt: f64,
}

impl FundsLocation {
    pub fn total(&self) -> f64 {
        self.cex_usdt + self.chain_usdt
    }

    /// The one direction that is physically executable from here, if any
    pub fn executable_direction(&self) -> Option<Direction> {
        match self.location {
            Location::Cex => Some(Direction::CexToChain),
            Location::Chain => Some(Direction::ChainToCex),
            Location::Split | Location::Empty => None,
        }
    }

    /// Capital available to commit from the source venue
    pub fn available_capital(&self) -> f64 {
        match self.location {
            Location::Cex => self.cex_usdt,
            Location::Chain => self.chain_usdt,
            Location::Split | Location::Empty => 0.0,
        }
    }
}

/// Inspects both venues and classifies the capital position
pub struct LocationTracker {
    cex: Arc<dyn CexVenue>,
    dex: Arc<dyn DexVenue>,
    /// Balances below this count as dust and classify as absent
    presence_threshold: f64,
}

impl LocationTracker {
    pub fn new(cex: Arc<dyn CexVenue>, dex: Arc<dyn DexVenue>, presence_threshold: f64) -> Self {
        Self {
            cex,
            dex,
            presence_threshold,
        }
    }

    /// Read both venues and classify.
    ///
    /// The CEX splits its balance across the FUND and UNIFIED
    /// sub-ledgers; they are summed into one logical balance. A chain
    /// read failure is treated as a zero balance so a flaky RPC cannot
    /// spuriously block the CEX side.
    pub async fn locate(&self) -> Result<FundsLocation, VenueError> {
        let fund = self
            .cex
            .get_balance(SETTLEMENT_CURRENCY, AccountScope::Fund)
            .await?;
        let unified = self
            .cex
            .get_balance(SETTLEMENT_CURRENCY, AccountScope::Unified)
            .await?;
        let cex_usdt = fund + unified;

        let chain_usdt = match self.dex.get_balance(SETTLEMENT_CURRENCY).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!("⚠️  Chain balance read failed, assuming 0: {}", e);
                0.0
            }
        };

        let on_cex = cex_usdt > self.presence_threshold;
        let on_chain = chain_usdt > self.presence_threshold;
        let location = match (on_cex, on_chain) {
            (true, false) => Location::Cex,
            (false, true) => Location::Chain,
            (true, true) => Location::Split,
            (false, false) => Location::Empty,
        };

        info!(
            "💰 Funds location: {} (cex: ${:.2}, chain: ${:.2})",
            location.as_str(),
            cex_usdt,
            chain_usdt
        );

        Ok(FundsLocation {
            location,
            cex_usdt,
            chain_usdt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::testing::{MockCex, MockDex};

    async fn locate(cex_fund: f64, cex_unified: f64, chain: f64) -> FundsLocation {
        let cex = MockCex::new();
        cex.set_balance("USDT", AccountScope::Fund, cex_fund);
        cex.set_balance("USDT", AccountScope::Unified, cex_unified);
        let dex = MockDex::new();
        dex.set_balance("USDT", chain);

        LocationTracker::new(Arc::new(cex), Arc::new(dex), 10.0)
            .locate()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn dust_on_the_cex_still_classifies_as_chain() {
        let loc = locate(0.00001, 0.0, 50.0).await;
        assert_eq!(loc.location, Location::Chain);
        assert_eq!(loc.executable_direction(), Some(Direction::ChainToCex));
    }

    #[tokio::test]
    async fn sub_ledgers_sum_into_one_logical_balance() {
        let loc = locate(6.0, 7.0, 0.0).await;
        assert_eq!(loc.location, Location::Cex);
        assert!((loc.cex_usdt - 13.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn meaningful_balances_on_both_venues_are_split() {
        let loc = locate(500.0, 0.0, 500.0).await;
        assert_eq!(loc.location, Location::Split);
        assert_eq!(loc.executable_direction(), None);
        assert_eq!(loc.available_capital(), 0.0);
    }

    #[tokio::test]
    async fn dust_everywhere_is_empty() {
        let loc = locate(1.0, 2.0, 3.0).await;
        assert_eq!(loc.location, Location::Empty);
    }
}
