//! Opportunity scanner
//!
//! Walks the candidate list in caller order, prices both venues per
//! candidate and keeps the single best strictly-profitable opportunity.
//! One scan evaluates exactly one direction: the other one is not
//! physically executable given where the capital sits.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::arbitrage::{cost_model, CostInputs, FeeSchedule, Opportunity};
use crate::domain::venues::{CexVenue, DexVenue};
use crate::shared::errors::{ScanError, VenueError};
use crate::shared::types::{Direction, SETTLEMENT_CURRENCY};

pub struct OpportunityScanner {
    cex: Arc<dyn CexVenue>,
    dex: Arc<dyn DexVenue>,
    fees: FeeSchedule,
    orderbook_depth: u32,
}

impl OpportunityScanner {
    pub fn new(
        cex: Arc<dyn CexVenue>,
        dex: Arc<dyn DexVenue>,
        fees: FeeSchedule,
        orderbook_depth: u32,
    ) -> Self {
        Self {
            cex,
            dex,
            fees,
            orderbook_depth,
        }
    }

    /// Scan `candidates` for the best opportunity in `direction` with
    /// `capital` USDT committed.
    ///
    /// A fetch failure for one candidate skips it and continues; one bad
    /// quote never aborts the scan. Returns `None` when nothing clears
    /// the threshold.
    pub async fn scan(
        &self,
        candidates: &[String],
        capital: f64,
        direction: Direction,
        threshold: f64,
    ) -> Result<Option<Opportunity>, ScanError> {
        if threshold <= 0.0 {
            return Err(ScanError::InvalidThreshold(threshold));
        }
        if candidates.is_empty() {
            return Err(ScanError::NoCandidates);
        }

        info!(
            "🔍 Scanning {} candidates, direction {}, capital ${:.2}, threshold ${:.2}",
            candidates.len(),
            direction,
            capital,
            threshold
        );

        let mut best: Option<Opportunity> = None;
        for coin in candidates {
            match self.evaluate(coin, capital, direction).await {
                Ok(opp) => {
                    let take = cost_model::is_profitable(opp.expected_profit, threshold)
                        && best
                            .as_ref()
                            .map(|b| opp.expected_profit > b.expected_profit)
                            .unwrap_or(true);
                    info!(
                        "   {} {}: cex=${:.6} dex=${:.6} slip={:.3}% profit=${:.2}",
                        if take { "✅" } else { "❌" },
                        coin,
                        opp.cex_price,
                        opp.dex_price,
                        opp.cex_slippage * 100.0,
                        opp.expected_profit
                    );
                    if take {
                        best = Some(opp);
                    }
                }
                Err(e) => {
                    warn!("   ⚠️  Skipping {}: {}", coin, e);
                }
            }
        }

        match &best {
            Some(opp) => info!(
                "💰 Best opportunity: {} ({}) projected profit ${:.2}",
                opp.coin, opp.direction, opp.expected_profit
            ),
            None => info!("⏳ No opportunity above threshold"),
        }
        Ok(best)
    }

    /// Price one candidate at both venues and run the cost model
    async fn evaluate(
        &self,
        coin: &str,
        capital: f64,
        direction: Direction,
    ) -> Result<Opportunity, VenueError> {
        // the aggregator rate and the orderbook are independent fetches
        let (dex_quote, book) = futures::try_join!(
            self.dex.get_quote(coin, SETTLEMENT_CURRENCY, 1.0),
            self.cex.get_orderbook(coin, self.orderbook_depth)
        )?;

        let dex_price = dex_quote.rate();
        if !dex_price.is_finite() || dex_price <= 0.0 {
            return Err(VenueError::QuoteUnavailable(format!(
                "aggregator returned a degenerate rate for {}",
                coin
            )));
        }

        // size the orderbook walk with the quantity the capital buys
        let qty_estimate = capital / dex_price;

        let (cex_price, cex_slippage, withdrawal_fee) = match direction {
            Direction::CexToChain => {
                let rate = book.buy_rate(qty_estimate).ok_or_else(|| {
                    VenueError::QuoteUnavailable(format!("empty ask side for {}", coin))
                })?;
                let slippage = book.estimate_buy_slippage(qty_estimate);
                let fee = self.cex.get_withdrawal_fee(coin).await?.ok_or_else(|| {
                    VenueError::QuoteUnavailable(format!("no withdrawal fee data for {}", coin))
                })?;
                (rate, slippage, fee)
            }
            Direction::ChainToCex => {
                let rate = book.sell_rate(qty_estimate).ok_or_else(|| {
                    VenueError::QuoteUnavailable(format!("empty bid side for {}", coin))
                })?;
                let slippage = book.estimate_sell_slippage(qty_estimate);
                (rate, slippage, 0.0)
            }
        };

        let inputs = CostInputs {
            cex_price,
            dex_price,
            capital,
            cex_slippage,
            withdrawal_fee,
        };
        let eval = cost_model::evaluate(direction, &inputs, &self.fees);

        Ok(Opportunity {
            coin: coin.to_string(),
            direction,
            capital,
            cex_price,
            dex_price,
            cex_slippage,
            withdrawal_fee,
            projected_out: eval.projected_out,
            expected_profit: eval.profit,
            costs: eval.costs,
            timestamp: chrono::Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::testing::{MockCex, MockDex};

    fn fees() -> FeeSchedule {
        FeeSchedule {
            cex_fee_rate: 0.001,
            settlement_cost: 0.05,
            dex_slippage_outbound: 0.002,
            dex_slippage_inbound: 0.001,
        }
    }

    fn scanner(cex: MockCex, dex: MockDex) -> OpportunityScanner {
        OpportunityScanner::new(Arc::new(cex), Arc::new(dex), fees(), 20)
    }

    #[tokio::test]
    async fn picks_the_most_profitable_candidate() {
        let cex = MockCex::new();
        cex.set_deep_book("AAA", 100.0);
        cex.set_deep_book("BBB", 50.0);
        cex.set_withdrawal_fee("AAA", 0.0);
        cex.set_withdrawal_fee("BBB", 0.0);

        let dex = MockDex::new();
        dex.set_rate("AAA", "USDT", 103.0); // ~2% edge
        dex.set_rate("BBB", "USDT", 53.0); // ~5.5% edge

        let scanner = scanner(cex, dex);
        let best = scanner
            .scan(
                &["AAA".to_string(), "BBB".to_string()],
                1000.0,
                Direction::CexToChain,
                0.5,
            )
            .await
            .unwrap()
            .expect("expected an opportunity");
        assert_eq!(best.coin, "BBB");
        assert!(best.expected_profit > 0.5);
    }

    #[tokio::test]
    async fn never_returns_profit_at_or_below_threshold() {
        let cex = MockCex::new();
        cex.set_deep_book("AAA", 100.0);
        cex.set_withdrawal_fee("AAA", 0.0);

        let dex = MockDex::new();
        // dead even prices: fees alone make this a loss
        dex.set_rate("AAA", "USDT", 100.0);

        let scanner = scanner(cex, dex);
        let best = scanner
            .scan(&["AAA".to_string()], 1000.0, Direction::CexToChain, 0.5)
            .await
            .unwrap();
        assert!(best.is_none());
    }

    #[tokio::test]
    async fn one_failing_quote_does_not_abort_the_scan() {
        let cex = MockCex::new();
        cex.set_deep_book("DEAD", 100.0);
        cex.set_deep_book("GOOD", 100.0);
        cex.set_withdrawal_fee("GOOD", 0.0);

        let dex = MockDex::new();
        dex.fail_quotes_for("DEAD");
        dex.set_rate("GOOD", "USDT", 104.0);

        let scanner = scanner(cex, dex);
        let best = scanner
            .scan(
                &["DEAD".to_string(), "GOOD".to_string()],
                1000.0,
                Direction::CexToChain,
                0.5,
            )
            .await
            .unwrap()
            .expect("healthy candidate should still be found");
        assert_eq!(best.coin, "GOOD");
    }

    #[tokio::test]
    async fn missing_withdrawal_fee_skips_the_candidate() {
        let cex = MockCex::new();
        cex.set_deep_book("AAA", 100.0);
        // no withdrawal fee registered for AAA

        let dex = MockDex::new();
        dex.set_rate("AAA", "USDT", 110.0);

        let scanner = scanner(cex, dex);
        let best = scanner
            .scan(&["AAA".to_string()], 1000.0, Direction::CexToChain, 0.5)
            .await
            .unwrap();
        assert!(best.is_none());
    }

    #[tokio::test]
    async fn chain_to_cex_prices_the_sell_side() {
        let cex = MockCex::new();
        cex.set_deep_book("AAA", 105.0);

        let dex = MockDex::new();
        dex.set_rate("AAA", "USDT", 100.0); // cheap on chain, rich on cex

        let scanner = scanner(cex, dex);
        let best = scanner
            .scan(&["AAA".to_string()], 1000.0, Direction::ChainToCex, 0.5)
            .await
            .unwrap()
            .expect("expected an opportunity");
        assert_eq!(best.direction, Direction::ChainToCex);
        assert_eq!(best.withdrawal_fee, 0.0);
        assert!(best.expected_profit > 0.0);
    }

    #[tokio::test]
    async fn rejects_non_positive_threshold() {
        let scanner = scanner(MockCex::new(), MockDex::new());
        let err = scanner
            .scan(&["AAA".to_string()], 1000.0, Direction::CexToChain, 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidThreshold(_)));
    }
}
