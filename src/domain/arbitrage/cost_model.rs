//! Cost model for one-shot cross-venue moves
//!
//! Pure functions only: given current prices, a capital amount and the
//! static fee schedule, project the final settlement-currency balance of
//! the full trade-transfer-trade sequence and the profit left after every
//! cost term. No I/O, no rounding; venue precision rounding happens at
//! order placement, not here.
//!
//! Both directions price the CEX leg with the probed orderbook slippage
//! and the aggregator leg with a fixed tolerance (aggregator depth cannot
//! be probed as precisely, and the quote goes stale while the deposit is
//! in flight).

use serde::{Deserialize, Serialize};

use crate::shared::types::Direction;

/// Static fee schedule for a venue pair, assembled once at startup and
/// passed in explicitly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Proportional CEX taker fee
    pub cex_fee_rate: f64,
    /// Flat settlement-chain transaction cost, in USDT
    pub settlement_cost: f64,
    /// Aggregator slippage tolerance when selling a deposit that arrived
    /// from the CEX
    pub dex_slippage_outbound: f64,
    /// Aggregator slippage tolerance on the chain-side buy leg
    pub dex_slippage_inbound: f64,
}

/// Market inputs for a single candidate evaluation
#[derive(Debug, Clone, Copy)]
pub struct CostInputs {
    /// CEX execution price for the probed quantity (USDT per coin)
    pub cex_price: f64,
    /// Aggregator fee-inclusive rate (USDT per coin)
    pub dex_price: f64,
    /// Committed settlement-currency capital
    pub capital: f64,
    /// Orderbook-derived CEX slippage for the probed quantity
    pub cex_slippage: f64,
    /// Fixed withdrawal fee in coin units (zero on the chain->cex path)
    pub withdrawal_fee: f64,
}

/// Projected cost terms of one evaluation, all in USDT
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub cex_fee: f64,
    pub cex_slippage: f64,
    pub dex_slippage: f64,
    pub withdrawal_fee: f64,
    pub settlement_cost: f64,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        self.cex_fee + self.cex_slippage + self.dex_slippage + self.withdrawal_fee
            + self.settlement_cost
    }
}

/// Outcome of a cost-model evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    /// Coin quantity carried across the settlement chain
    pub carried_qty: f64,
    /// Projected final settlement-currency balance
    pub projected_out: f64,
    /// Projected profit: final minus initial, net of every cost term
    pub profit: f64,
    pub costs: CostBreakdown,
}

/// Evaluate one direction
pub fn evaluate(direction: Direction, inputs: &CostInputs, fees: &FeeSchedule) -> Evaluation {
    match direction {
        Direction::CexToChain => evaluate_cex_to_chain(inputs, fees),
        Direction::ChainToCex => evaluate_chain_to_cex(inputs, fees),
    }
}

/// Capital starts at the CEX: buy the coin there (fee and probed
/// slippage), withdraw it (flat fee in coin units), sell it through the
/// aggregator (fee-inclusive rate less the fixed tolerance), pay the
/// settlement transaction.
pub fn evaluate_cex_to_chain(inputs: &CostInputs, fees: &FeeSchedule) -> Evaluation {
    let CostInputs {
        cex_price,
        dex_price,
        capital,
        cex_slippage,
        withdrawal_fee,
    } = *inputs;

    let qty = capital * (1.0 - fees.cex_fee_rate) / (cex_price * (1.0 + cex_slippage));
    let carried_qty = qty - withdrawal_fee;
    let effective_dex = dex_price * (1.0 - fees.dex_slippage_outbound);
    let projected_out = carried_qty * effective_dex;
    let profit = projected_out - capital - fees.settlement_cost;

    let costs = CostBreakdown {
        cex_fee: capital * fees.cex_fee_rate,
        cex_slippage: capital * cex_slippage / (1.0 + cex_slippage),
        dex_slippage: carried_qty * dex_price * fees.dex_slippage_outbound,
        withdrawal_fee: withdrawal_fee * effective_dex,
        settlement_cost: fees.settlement_cost,
    };

    Evaluation {
        carried_qty,
        projected_out,
        profit,
        costs,
    }
}

/// Capital starts on chain: the settlement transaction comes off the top,
/// the aggregator buy leg pays the fixed tolerance, the CEX sell leg pays
/// the probed slippage and the trading fee.
pub fn evaluate_chain_to_cex(inputs: &CostInputs, fees: &FeeSchedule) -> Evaluation {
    let CostInputs {
        cex_price,
        dex_price,
        capital,
        cex_slippage,
        withdrawal_fee: _,
    } = *inputs;

    let investable = capital - fees.settlement_cost;
    let carried_qty = investable / (dex_price * (1.0 + fees.dex_slippage_inbound));
    let gross = carried_qty * cex_price;
    let projected_out = gross * (1.0 - cex_slippage) * (1.0 - fees.cex_fee_rate);
    let profit = projected_out - capital;

    let costs = CostBreakdown {
        cex_fee: gross * (1.0 - cex_slippage) * fees.cex_fee_rate,
        cex_slippage: gross * cex_slippage,
        dex_slippage: investable * fees.dex_slippage_inbound / (1.0 + fees.dex_slippage_inbound),
        withdrawal_fee: 0.0,
        settlement_cost: fees.settlement_cost,
    };

    Evaluation {
        carried_qty,
        projected_out,
        profit,
        costs,
    }
}

/// Break-even value of the source-side slippage term: the slippage that
/// drives the projected profit of `direction` to exactly zero, holding
/// every other cost fixed.
///
/// For cex->chain this solves for the CEX buy slippage; for chain->cex it
/// solves for the aggregator tolerance on the buy leg. Used to quantify
/// how much execution-cost headroom a candidate has, without re-deriving
/// the profit formula.
pub fn break_even_source_slippage(
    direction: Direction,
    inputs: &CostInputs,
    fees: &FeeSchedule,
) -> f64 {
    match direction {
        Direction::CexToChain => {
            let effective_dex = inputs.dex_price * (1.0 - fees.dex_slippage_outbound);
            let numerator = inputs.capital * (1.0 - fees.cex_fee_rate) * effective_dex;
            let denominator = inputs.cex_price
                * (inputs.capital
                    + fees.settlement_cost
                    + inputs.withdrawal_fee * effective_dex);
            numerator / denominator - 1.0
        }
        Direction::ChainToCex => {
            let numerator = (inputs.capital - fees.settlement_cost)
                * inputs.cex_price
                * (1.0 - inputs.cex_slippage)
                * (1.0 - fees.cex_fee_rate);
            let denominator = inputs.dex_price * inputs.capital;
            numerator / denominator - 1.0
        }
    }
}

/// Profitability predicate: strictly above the caller's threshold.
///
/// The threshold is required to be strictly positive by configuration
/// validation, so a zero-profit trade is never taken; the margin absorbs
/// model error.
pub fn is_profitable(profit: f64, threshold: f64) -> bool {
    profit > threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fees() -> FeeSchedule {
        FeeSchedule {
            cex_fee_rate: 0.001,
            settlement_cost: 0.05,
            dex_slippage_outbound: 0.002,
            dex_slippage_inbound: 0.001,
        }
    }

    fn inputs(cex_price: f64, dex_price: f64) -> CostInputs {
        CostInputs {
            cex_price,
            dex_price,
            capital: 1000.0,
            cex_slippage: 0.0005,
            withdrawal_fee: 0.01,
        }
    }

    #[test]
    fn cex_to_chain_profit_matches_reference_formula() {
        // price_cex=100, price_dex=105, capital=1000, zero withdrawal fee,
        // 0.1% cex fee, 0.2% dex tolerance, everything else zeroed
        let fees = FeeSchedule {
            cex_fee_rate: 0.001,
            settlement_cost: 0.0,
            dex_slippage_outbound: 0.002,
            dex_slippage_inbound: 0.001,
        };
        let inputs = CostInputs {
            cex_price: 100.0,
            dex_price: 105.0,
            capital: 1000.0,
            cex_slippage: 0.0,
            withdrawal_fee: 0.0,
        };
        let eval = evaluate_cex_to_chain(&inputs, &fees);
        let reference = 1000.0 * (1.0 - 0.001) * (105.0 / 100.0) * (1.0 - 0.002) - 1000.0;
        assert!(eval.profit > 0.0);
        assert!((eval.profit - reference).abs() / reference < 0.01);
    }

    #[test]
    fn cex_to_chain_profit_increases_with_price_gap() {
        let fees = fees();
        let mut last = f64::NEG_INFINITY;
        for dex_price in [100.0, 101.0, 103.0, 106.0, 110.0] {
            let eval = evaluate_cex_to_chain(&inputs(100.0, dex_price), &fees);
            assert!(eval.profit > last, "profit must rise with dex premium");
            last = eval.profit;
        }
    }

    #[test]
    fn chain_to_cex_profit_decreases_with_price_gap() {
        let fees = fees();
        let mut last = f64::INFINITY;
        for dex_price in [95.0, 98.0, 100.0, 103.0] {
            let eval = evaluate_chain_to_cex(&inputs(100.0, dex_price), &fees);
            assert!(eval.profit < last, "profit must fall as the dex price rises");
            last = eval.profit;
        }
    }

    #[test]
    fn break_even_slippage_zeroes_cex_to_chain_profit() {
        let fees = fees();
        let base = inputs(100.0, 104.0);
        let s_max = break_even_source_slippage(Direction::CexToChain, &base, &fees);
        assert!(s_max > 0.0);

        let at_break_even = CostInputs {
            cex_slippage: s_max,
            ..base
        };
        let eval = evaluate_cex_to_chain(&at_break_even, &fees);
        assert!(eval.profit.abs() < 1e-9);
    }

    #[test]
    fn break_even_slippage_zeroes_chain_to_cex_profit() {
        let fees = fees();
        let base = inputs(104.0, 100.0);
        let s_max = break_even_source_slippage(Direction::ChainToCex, &base, &fees);
        assert!(s_max > 0.0);

        let solved_fees = FeeSchedule {
            dex_slippage_inbound: s_max,
            ..fees
        };
        let eval = evaluate_chain_to_cex(&base, &solved_fees);
        assert!(eval.profit.abs() < 1e-9);
    }

    #[test]
    fn withdrawal_fee_reduces_carried_quantity() {
        let fees = fees();
        let with_fee = evaluate_cex_to_chain(&inputs(100.0, 105.0), &fees);
        let without_fee = evaluate_cex_to_chain(
            &CostInputs {
                withdrawal_fee: 0.0,
                ..inputs(100.0, 105.0)
            },
            &fees,
        );
        assert!(with_fee.carried_qty < without_fee.carried_qty);
        assert!(with_fee.profit < without_fee.profit);
    }

    #[test]
    fn breakdown_terms_reconcile_with_profit() {
        let fees = fees();
        for direction in [Direction::CexToChain, Direction::ChainToCex] {
            let eval = evaluate(direction, &inputs(100.0, 102.0), &fees);
            // frictionless round trip through the two rates, minus every
            // cost term, should land near the projected profit
            let frictionless = match direction {
                Direction::CexToChain => 1000.0 / 100.0 * 102.0 - 1000.0,
                Direction::ChainToCex => 1000.0 / 102.0 * 100.0 - 1000.0,
            };
            let reconstructed = frictionless - eval.costs.total();
            assert!(
                (reconstructed - eval.profit).abs() < 1000.0 * 1e-4,
                "direction {:?}: {} vs {}",
                direction,
                reconstructed,
                eval.profit
            );
        }
    }

    #[test]
    fn zero_profit_is_never_profitable() {
        assert!(!is_profitable(0.0, 0.5));
        assert!(!is_profitable(0.5, 0.5));
        assert!(is_profitable(0.51, 0.5));
    }
}
