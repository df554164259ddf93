//! Arbitrage domain - cost model and opportunity scanning

pub mod cost_model;
pub mod scanner;

pub use cost_model::{CostBreakdown, CostInputs, Evaluation, FeeSchedule};
pub use scanner::OpportunityScanner;

use serde::{Deserialize, Serialize};

use crate::shared::types::Direction;

/// A single evaluated cross-venue opportunity.
///
/// Created fresh by every scan, never mutated, consumed once by the
/// orchestrator. The projected figures rank candidates; execution always
/// works from actually-filled quantities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub coin: String,
    pub direction: Direction,
    /// Settlement-currency capital committed to the move
    pub capital: f64,
    /// CEX execution price for the probed quantity
    pub cex_price: f64,
    /// Aggregator fee-inclusive rate
    pub dex_price: f64,
    /// Orderbook-derived CEX slippage estimate
    pub cex_slippage: f64,
    /// Fixed withdrawal fee in coin units (zero on the chain->cex path)
    pub withdrawal_fee: f64,
    /// Projected final settlement-currency balance
    pub projected_out: f64,
    pub expected_profit: f64,
    pub costs: CostBreakdown,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
