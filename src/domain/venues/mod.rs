//! Venue contracts - the abstract interfaces the core trades through
//!
//! The decision engine and the orchestrator only ever see these traits;
//! the concrete REST/RPC clients live in the infrastructure layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::errors::VenueError;
use crate::shared::types::{AccountScope, AmountUnit, OrderSide};

/// Price band around the best level used for depth-based slippage
/// estimation (1%)
const DEPTH_BAND: f64 = 0.01;

/// Spot orderbook snapshot, best levels first on both sides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<(f64, f64)>,
    pub asks: Vec<(f64, f64)>,
}

impl OrderBook {
    /// Average rate paid when buying `qty` from the asks.
    ///
    /// Walks the book from the best ask; if the snapshot is thinner than
    /// `qty` the average over the filled part is returned. `None` when
    /// the book is empty.
    pub fn buy_rate(&self, qty: f64) -> Option<f64> {
        let mut asks = self.asks.clone();
        asks.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        average_fill_rate(&asks, qty)
    }

    /// Average rate received when selling `qty` into the bids
    pub fn sell_rate(&self, qty: f64) -> Option<f64> {
        let mut bids = self.bids.clone();
        bids.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        average_fill_rate(&bids, qty)
    }

    /// Estimate buy slippage with the depth ratio method:
    /// `s ≈ 0.01 × qty / depth_1%`, where `depth_1%` is the ask volume
    /// within 1% of the best ask.
    pub fn estimate_buy_slippage(&self, qty: f64) -> f64 {
        let best_ask = self
            .asks
            .iter()
            .map(|(p, _)| *p)
            .fold(f64::INFINITY, f64::min);
        if !best_ask.is_finite() {
            return 0.0;
        }
        let threshold = best_ask * (1.0 + DEPTH_BAND);
        let depth: f64 = self
            .asks
            .iter()
            .filter(|(p, _)| *p <= threshold)
            .map(|(_, sz)| *sz)
            .sum();
        if depth == 0.0 {
            return 0.0;
        }
        DEPTH_BAND * (qty / depth)
    }

    /// Estimate sell slippage from the bid volume within 1% of the best bid
    pub fn estimate_sell_slippage(&self, qty: f64) -> f64 {
        let best_bid = self
            .bids
            .iter()
            .map(|(p, _)| *p)
            .fold(f64::NEG_INFINITY, f64::max);
        if !best_bid.is_finite() {
            return 0.0;
        }
        let threshold = best_bid * (1.0 - DEPTH_BAND);
        let depth: f64 = self
            .bids
            .iter()
            .filter(|(p, _)| *p >= threshold)
            .map(|(_, sz)| *sz)
            .sum();
        if depth == 0.0 {
            return 0.0;
        }
        DEPTH_BAND * (qty / depth)
    }
}

fn average_fill_rate(levels: &[(f64, f64)], qty: f64) -> Option<f64> {
    let mut remaining = qty;
    let mut cost = 0.0;
    for (price, size) in levels {
        if remaining <= 0.0 {
            break;
        }
        let take = remaining.min(*size);
        cost += take * price;
        remaining -= take;
    }
    let filled = qty - remaining;
    if filled <= 0.0 {
        None
    } else {
        Some(cost / filled)
    }
}

/// Result of a CEX market order, with the actually-filled quantity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFill {
    pub order_id: String,
    /// Base quantity actually acquired or sold
    pub filled_qty: f64,
    pub avg_price: f64,
    pub raw: serde_json::Value,
}

/// Acknowledged CEX withdrawal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    pub withdrawal_id: String,
    pub raw: serde_json::Value,
}

/// Fee-inclusive aggregator quote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapQuote {
    pub in_amount: f64,
    pub out_amount: f64,
    pub raw: serde_json::Value,
}

impl SwapQuote {
    /// Output units per input unit
    pub fn rate(&self) -> f64 {
        if self.in_amount > 0.0 {
            self.out_amount / self.in_amount
        } else {
            0.0
        }
    }
}

/// Confirmed on-chain swap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapExecution {
    pub signature: String,
    pub in_amount: f64,
    pub out_amount: f64,
    pub raw: serde_json::Value,
}

/// Centralized exchange: custodial accounts plus an order book
#[async_trait]
pub trait CexVenue: Send + Sync {
    async fn get_orderbook(&self, coin: &str, depth: u32) -> Result<OrderBook, VenueError>;

    /// Place a spot market order; the returned fill carries the
    /// actually-executed quantity
    async fn place_market_order(
        &self,
        coin: &str,
        side: OrderSide,
        amount: f64,
        unit: AmountUnit,
    ) -> Result<OrderFill, VenueError>;

    async fn get_balance(&self, asset: &str, scope: AccountScope) -> Result<f64, VenueError>;

    async fn internal_transfer(
        &self,
        asset: &str,
        amount: f64,
        from: AccountScope,
        to: AccountScope,
    ) -> Result<(), VenueError>;

    async fn withdraw(
        &self,
        asset: &str,
        amount: f64,
        address: &str,
    ) -> Result<Withdrawal, VenueError>;

    /// Fixed withdrawal fee in asset units, `None` when the venue does
    /// not publish one for this asset
    async fn get_withdrawal_fee(&self, asset: &str) -> Result<Option<f64>, VenueError>;

    async fn get_deposit_address(&self, asset: &str) -> Result<String, VenueError>;
}

/// On-chain swap aggregator reachable through the wallet that holds the
/// chain-side funds
#[async_trait]
pub trait DexVenue: Send + Sync {
    /// Fee-inclusive quote for swapping `amount` of `input` into `output`
    async fn get_quote(
        &self,
        input: &str,
        output: &str,
        amount: f64,
    ) -> Result<SwapQuote, VenueError>;

    async fn swap(
        &self,
        input: &str,
        output: &str,
        amount: f64,
    ) -> Result<SwapExecution, VenueError>;

    async fn get_balance(&self, asset: &str) -> Result<f64, VenueError>;

    /// Signed on-chain transfer to an external address; returns the
    /// transaction signature
    async fn transfer(
        &self,
        asset: &str,
        amount: f64,
        address: &str,
    ) -> Result<String, VenueError>;

    /// Deposit address of the chain-side wallet
    fn wallet_address(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book() -> OrderBook {
        OrderBook {
            bids: vec![(99.0, 5.0), (98.5, 10.0), (90.0, 50.0)],
            asks: vec![(100.0, 5.0), (100.5, 10.0), (110.0, 50.0)],
        }
    }

    #[test]
    fn buy_rate_walks_the_asks() {
        let book = sample_book();
        // 5 @ 100.0 + 5 @ 100.5
        let rate = book.buy_rate(10.0).unwrap();
        assert!((rate - 100.25).abs() < 1e-9);
    }

    #[test]
    fn sell_rate_walks_the_bids() {
        let book = sample_book();
        let rate = book.sell_rate(5.0).unwrap();
        assert!((rate - 99.0).abs() < 1e-9);
    }

    #[test]
    fn empty_book_yields_no_rate() {
        let book = OrderBook {
            bids: vec![],
            asks: vec![],
        };
        assert!(book.buy_rate(1.0).is_none());
        assert!(book.sell_rate(1.0).is_none());
    }

    #[test]
    fn buy_slippage_scales_with_quantity() {
        let book = sample_book();
        // ask depth within 1% of best ask (<= 101.0): 5 + 10 = 15
        let s1 = book.estimate_buy_slippage(1.5);
        let s2 = book.estimate_buy_slippage(3.0);
        assert!((s1 - 0.001).abs() < 1e-9);
        assert!((s2 - 2.0 * s1).abs() < 1e-9);
    }

    #[test]
    fn sell_slippage_uses_bid_depth() {
        let book = sample_book();
        // bid depth within 1% of best bid (>= 98.01): 5 + 10 = 15
        let s = book.estimate_sell_slippage(15.0);
        assert!((s - 0.01).abs() < 1e-9);
    }
}
