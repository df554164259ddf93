//! Execution orchestrator
//!
//! Runs one arbitrage attempt to completion or abort:
//! `SourceTrade -> TransferOut -> AwaitSettlement -> DestinationTrade`.
//! Steps never run out of order and never react to mid-flight market
//! movement; the only retry loop is the bounded settlement poll. A failed
//! trade is never replayed, because replaying it would duplicate the
//! order under a changed price regime. There is no automatic reversal
//! either: reversing needs a fresh profitability judgment, so an aborted
//! attempt surfaces everything needed for manual recovery instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::arbitrage::Opportunity;
use crate::domain::execution::{ExecutionGate, ExecutionResult, ExecutionStep, StepRecord};
use crate::domain::venues::{CexVenue, DexVenue};
use crate::shared::errors::{ExecutionError, VenueError};
use crate::shared::types::{
    AccountScope, AmountUnit, Direction, OrderSide, NATIVE_TOKEN, SETTLEMENT_CURRENCY,
};
use crate::shared::utils::{format_usdt, percentage};

/// Fraction of the transferred amount that must show up at the
/// destination before the deposit counts as settled. Half tolerates
/// fee-adjusted crediting without ever trading an unconfirmed deposit.
const CONFIRMATION_RATIO: f64 = 0.5;

/// Settlement polling parameters
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    pub poll_interval: Duration,
    pub max_polls: u32,
    /// Extra wait after confirmation before the deposit is traded
    pub grace: Duration,
}

/// State accumulated while one attempt runs
struct Attempt {
    steps: Vec<StepRecord>,
    initial_balance: Option<f64>,
    final_balance: Option<f64>,
}

impl Attempt {
    fn new() -> Self {
        Self {
            steps: Vec::new(),
            initial_balance: None,
            final_balance: None,
        }
    }

    fn record(&mut self, step: ExecutionStep, detail: serde_json::Value) {
        self.steps.push(StepRecord {
            step,
            timestamp: chrono::Utc::now(),
            detail,
        });
    }
}

fn venue_step(step: ExecutionStep) -> impl FnOnce(VenueError) -> ExecutionError {
    move |source| ExecutionError::Venue {
        step: step.as_str().to_string(),
        source,
    }
}

pub struct ExecutionOrchestrator {
    cex: Arc<dyn CexVenue>,
    dex: Arc<dyn DexVenue>,
    settlement: SettlementConfig,
    /// SOL held back for transaction fees when the coin being moved is
    /// the native token itself
    sol_fee_reserve: f64,
    gate: Option<Arc<dyn ExecutionGate>>,
    /// Attempts are single-flight per orchestrator; venue accounts have
    /// a single writer
    run_guard: tokio::sync::Mutex<()>,
    cancelled: Arc<AtomicBool>,
}

impl ExecutionOrchestrator {
    pub fn new(
        cex: Arc<dyn CexVenue>,
        dex: Arc<dyn DexVenue>,
        settlement: SettlementConfig,
        sol_fee_reserve: f64,
    ) -> Self {
        Self {
            cex,
            dex,
            settlement,
            sol_fee_reserve,
            gate: None,
            run_guard: tokio::sync::Mutex::new(()),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Install a manual confirmation gate consulted before any capital
    /// moves
    pub fn with_gate(mut self, gate: Arc<dyn ExecutionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Flag observed between settlement polls; setting it aborts the
    /// wait without killing the process
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Run one attempt for the selected opportunity
    pub async fn execute(&self, opportunity: &Opportunity) -> ExecutionResult {
        let attempt_id = Uuid::new_v4();
        let started_at = chrono::Utc::now();
        let mut attempt = Attempt::new();

        let outcome = match self.run_guard.try_lock() {
            Ok(_guard) => {
                if let Some(declined) = self.check_gate(opportunity).await {
                    Err(declined)
                } else {
                    info!(
                        "🚀 Executing {} for {} with ${:.2} (attempt {})",
                        opportunity.direction, opportunity.coin, opportunity.capital, attempt_id
                    );
                    match opportunity.direction {
                        Direction::CexToChain => {
                            self.run_cex_to_chain(opportunity, &mut attempt).await
                        }
                        Direction::ChainToCex => {
                            self.run_chain_to_cex(opportunity, &mut attempt).await
                        }
                    }
                }
            }
            Err(_) => Err(ExecutionError::AttemptInProgress),
        };

        let realized_profit = match (attempt.initial_balance, attempt.final_balance) {
            (Some(initial), Some(final_balance)) => Some(final_balance - initial),
            _ => None,
        };

        match &outcome {
            Ok(()) => {
                let realized = realized_profit.unwrap_or(0.0);
                info!(
                    "🎉 {} completed: realized {} ({:.2}%), projected {}, deviation {}",
                    opportunity.coin,
                    format_usdt(realized),
                    percentage(realized, opportunity.capital),
                    format_usdt(opportunity.expected_profit),
                    format_usdt(realized - opportunity.expected_profit)
                );
            }
            Err(e) => {
                error!(
                    "❌ Execution aborted after {} step(s): {}",
                    attempt.steps.len(),
                    e
                );
            }
        }

        ExecutionResult {
            attempt_id,
            direction: opportunity.direction,
            coin: opportunity.coin.clone(),
            steps: attempt.steps,
            initial_balance: attempt.initial_balance,
            final_balance: attempt.final_balance,
            expected_profit: opportunity.expected_profit,
            realized_profit,
            success: outcome.is_ok(),
            error: outcome.err(),
            started_at,
            finished_at: chrono::Utc::now(),
        }
    }

    async fn check_gate(&self, opportunity: &Opportunity) -> Option<ExecutionError> {
        if let Some(gate) = &self.gate {
            if !gate.approve(opportunity).await {
                warn!("🛑 Confirmation gate declined {}", opportunity.coin);
                return Some(ExecutionError::Declined);
            }
        }
        None
    }

    /// Buy on the CEX, withdraw to the chain wallet, sell through the
    /// aggregator
    async fn run_cex_to_chain(
        &self,
        opp: &Opportunity,
        attempt: &mut Attempt,
    ) -> Result<(), ExecutionError> {
        let coin = opp.coin.as_str();

        let fund = self
            .cex
            .get_balance(SETTLEMENT_CURRENCY, AccountScope::Fund)
            .await
            .map_err(venue_step(ExecutionStep::SourceTrade))?;
        let unified = self
            .cex
            .get_balance(SETTLEMENT_CURRENCY, AccountScope::Unified)
            .await
            .map_err(venue_step(ExecutionStep::SourceTrade))?;
        let initial = fund + unified;
        attempt.initial_balance = Some(initial);
        if initial < opp.capital {
            return Err(ExecutionError::InsufficientBalance {
                venue: "cex".to_string(),
                asset: SETTLEMENT_CURRENCY.to_string(),
                have: initial,
                need: opp.capital,
            });
        }

        // Step 1: market buy for the full committed capital. The filled
        // quantity is the carry-forward amount from here on; the model's
        // projection was only for ranking.
        let fill = self
            .cex
            .place_market_order(coin, OrderSide::Buy, opp.capital, AmountUnit::Quote)
            .await
            .map_err(|e| ExecutionError::OrderRejected {
                venue: "cex".to_string(),
                coin: coin.to_string(),
                detail: e.to_string(),
            })?;
        if fill.filled_qty <= 0.0 {
            return Err(ExecutionError::OrderRejected {
                venue: "cex".to_string(),
                coin: coin.to_string(),
                detail: "market order filled zero quantity".to_string(),
            });
        }
        attempt.record(
            ExecutionStep::SourceTrade,
            json!({
                "order_id": fill.order_id,
                "filled_qty": fill.filled_qty,
                "avg_price": fill.avg_price,
                "raw": fill.raw,
            }),
        );
        info!("✅ Bought {:.6} {} on the CEX", fill.filled_qty, coin);

        // Step 2: move the fill to the funding ledger and withdraw it,
        // less the flat leg fee, so the settlement check has a
        // well-defined lower bound.
        let transfer_amount = fill.filled_qty - opp.withdrawal_fee;
        if transfer_amount <= 0.0 {
            return Err(ExecutionError::TransferFailed {
                venue: "cex".to_string(),
                coin: coin.to_string(),
                amount: transfer_amount,
                detail: "withdrawal fee exceeds the filled quantity".to_string(),
            });
        }
        self.cex
            .internal_transfer(coin, fill.filled_qty, AccountScope::Unified, AccountScope::Fund)
            .await
            .map_err(venue_step(ExecutionStep::TransferOut))?;
        let baseline = self
            .dex
            .get_balance(coin)
            .await
            .map_err(venue_step(ExecutionStep::TransferOut))?;
        let address = self.dex.wallet_address();
        let withdrawal = self
            .cex
            .withdraw(coin, transfer_amount, &address)
            .await
            .map_err(|e| ExecutionError::TransferFailed {
                venue: "cex".to_string(),
                coin: coin.to_string(),
                amount: transfer_amount,
                detail: e.to_string(),
            })?;
        attempt.record(
            ExecutionStep::TransferOut,
            json!({
                "withdrawal_id": withdrawal.withdrawal_id,
                "amount": transfer_amount,
                "address": address,
                "raw": withdrawal.raw,
            }),
        );
        info!("✅ Withdrawal of {:.6} {} initiated", transfer_amount, coin);

        // Step 3: wait for the deposit to land in the wallet
        let (observed, polls) = self
            .await_settlement(Direction::CexToChain, coin, baseline, transfer_amount)
            .await?;
        attempt.record(
            ExecutionStep::AwaitSettlement,
            json!({"baseline": baseline, "observed_rise": observed, "polls": polls}),
        );

        // Step 4: sell whatever actually arrived; path-wise fees and
        // rounding make the wallet balance authoritative
        let arrived = self
            .dex
            .get_balance(coin)
            .await
            .map_err(venue_step(ExecutionStep::DestinationTrade))?;
        let mut sell_qty = arrived;
        if coin == NATIVE_TOKEN {
            sell_qty -= self.sol_fee_reserve;
        }
        if sell_qty <= 0.0 {
            return Err(ExecutionError::OrderRejected {
                venue: "dex".to_string(),
                coin: coin.to_string(),
                detail: format!("nothing to sell after fee reserve (balance {})", arrived),
            });
        }
        let swap = self
            .dex
            .swap(coin, SETTLEMENT_CURRENCY, sell_qty)
            .await
            .map_err(|e| ExecutionError::OrderRejected {
                venue: "dex".to_string(),
                coin: coin.to_string(),
                detail: e.to_string(),
            })?;
        attempt.record(
            ExecutionStep::DestinationTrade,
            json!({
                "signature": swap.signature,
                "in_amount": swap.in_amount,
                "out_amount": swap.out_amount,
                "raw": swap.raw,
            }),
        );
        info!("✅ Sold {:.6} {} through the aggregator", sell_qty, coin);

        let final_balance = self
            .dex
            .get_balance(SETTLEMENT_CURRENCY)
            .await
            .map_err(venue_step(ExecutionStep::DestinationTrade))?;
        attempt.final_balance = Some(final_balance);
        Ok(())
    }

    /// Buy through the aggregator, deposit to the CEX, sell there
    async fn run_chain_to_cex(
        &self,
        opp: &Opportunity,
        attempt: &mut Attempt,
    ) -> Result<(), ExecutionError> {
        let coin = opp.coin.as_str();

        let initial = self
            .dex
            .get_balance(SETTLEMENT_CURRENCY)
            .await
            .map_err(venue_step(ExecutionStep::SourceTrade))?;
        attempt.initial_balance = Some(initial);
        if initial < opp.capital {
            return Err(ExecutionError::InsufficientBalance {
                venue: "chain".to_string(),
                asset: SETTLEMENT_CURRENCY.to_string(),
                have: initial,
                need: opp.capital,
            });
        }

        // Step 1: swap the committed capital into the coin
        let swap = self
            .dex
            .swap(SETTLEMENT_CURRENCY, coin, opp.capital)
            .await
            .map_err(|e| ExecutionError::OrderRejected {
                venue: "dex".to_string(),
                coin: coin.to_string(),
                detail: e.to_string(),
            })?;
        let filled = swap.out_amount;
        if filled <= 0.0 {
            return Err(ExecutionError::OrderRejected {
                venue: "dex".to_string(),
                coin: coin.to_string(),
                detail: "swap returned zero output".to_string(),
            });
        }
        attempt.record(
            ExecutionStep::SourceTrade,
            json!({
                "signature": swap.signature,
                "in_amount": swap.in_amount,
                "out_amount": swap.out_amount,
                "raw": swap.raw,
            }),
        );
        info!("✅ Bought {:.6} {} through the aggregator", filled, coin);

        // Step 2: signed transfer to the exchange deposit address. The
        // chain leg fee is paid in SOL, so only the native token itself
        // needs a reserve held back.
        let deposit_address = self
            .cex
            .get_deposit_address(coin)
            .await
            .map_err(venue_step(ExecutionStep::TransferOut))?;
        let baseline = self
            .cex
            .get_balance(coin, AccountScope::Fund)
            .await
            .map_err(venue_step(ExecutionStep::TransferOut))?;
        let transfer_amount = if coin == NATIVE_TOKEN {
            filled - self.sol_fee_reserve
        } else {
            filled
        };
        if transfer_amount <= 0.0 {
            return Err(ExecutionError::TransferFailed {
                venue: "chain".to_string(),
                coin: coin.to_string(),
                amount: transfer_amount,
                detail: "nothing left to transfer after the fee reserve".to_string(),
            });
        }
        let signature = self
            .dex
            .transfer(coin, transfer_amount, &deposit_address)
            .await
            .map_err(|e| ExecutionError::TransferFailed {
                venue: "chain".to_string(),
                coin: coin.to_string(),
                amount: transfer_amount,
                detail: e.to_string(),
            })?;
        attempt.record(
            ExecutionStep::TransferOut,
            json!({
                "signature": signature,
                "amount": transfer_amount,
                "address": deposit_address,
            }),
        );
        info!(
            "✅ Sent {:.6} {} to the exchange deposit address",
            transfer_amount, coin
        );

        // Step 3: wait for the deposit to be credited on the funding
        // ledger
        let (observed, polls) = self
            .await_settlement(Direction::ChainToCex, coin, baseline, transfer_amount)
            .await?;
        attempt.record(
            ExecutionStep::AwaitSettlement,
            json!({"baseline": baseline, "observed_rise": observed, "polls": polls}),
        );

        // Step 4: move the credited deposit to the trading ledger and
        // sell all of it
        let arrived = self
            .cex
            .get_balance(coin, AccountScope::Fund)
            .await
            .map_err(venue_step(ExecutionStep::DestinationTrade))?;
        if arrived <= 0.0 {
            return Err(ExecutionError::OrderRejected {
                venue: "cex".to_string(),
                coin: coin.to_string(),
                detail: "credited deposit balance is zero".to_string(),
            });
        }
        self.cex
            .internal_transfer(coin, arrived, AccountScope::Fund, AccountScope::Unified)
            .await
            .map_err(venue_step(ExecutionStep::DestinationTrade))?;
        let fill = self
            .cex
            .place_market_order(coin, OrderSide::Sell, arrived, AmountUnit::Base)
            .await
            .map_err(|e| ExecutionError::OrderRejected {
                venue: "cex".to_string(),
                coin: coin.to_string(),
                detail: e.to_string(),
            })?;
        attempt.record(
            ExecutionStep::DestinationTrade,
            json!({
                "order_id": fill.order_id,
                "filled_qty": fill.filled_qty,
                "avg_price": fill.avg_price,
                "raw": fill.raw,
            }),
        );
        info!("✅ Sold {:.6} {} on the CEX", arrived, coin);

        let fund = self
            .cex
            .get_balance(SETTLEMENT_CURRENCY, AccountScope::Fund)
            .await
            .map_err(venue_step(ExecutionStep::DestinationTrade))?;
        let unified = self
            .cex
            .get_balance(SETTLEMENT_CURRENCY, AccountScope::Unified)
            .await
            .map_err(venue_step(ExecutionStep::DestinationTrade))?;
        attempt.final_balance = Some(fund + unified);
        Ok(())
    }

    /// Poll the destination balance until it rises by at least half the
    /// transferred amount, or the bounded timeout elapses.
    ///
    /// This is the sole suspension point of a run. The cancellation flag
    /// is observed between iterations; a transient read failure counts
    /// against the poll budget instead of aborting. On confirmation a
    /// short grace period passes before the caller may trade the
    /// deposit.
    async fn await_settlement(
        &self,
        direction: Direction,
        coin: &str,
        baseline: f64,
        expected: f64,
    ) -> Result<(f64, u32), ExecutionError> {
        let target = expected * CONFIRMATION_RATIO;
        let mut observed = 0.0;
        info!(
            "⏳ Awaiting settlement of {:.6} {} (confirm at rise >= {:.6})",
            expected, coin, target
        );

        for poll in 1..=self.settlement.max_polls {
            if self.cancelled.load(Ordering::Relaxed) {
                return Err(ExecutionError::Cancelled);
            }
            sleep(self.settlement.poll_interval).await;

            let balance = match direction {
                Direction::CexToChain => self.dex.get_balance(coin).await,
                Direction::ChainToCex => self.cex.get_balance(coin, AccountScope::Fund).await,
            };
            match balance {
                Ok(balance) => {
                    observed = balance - baseline;
                    if observed >= target {
                        info!(
                            "✅ Deposit confirmed after {} poll(s): rise {:.6} {}",
                            poll, observed, coin
                        );
                        sleep(self.settlement.grace).await;
                        return Ok((observed, poll));
                    }
                    info!(
                        "   poll {}/{}: rise {:.6} of {:.6} {}",
                        poll, self.settlement.max_polls, observed, target, coin
                    );
                }
                Err(e) => {
                    warn!("   poll {}/{} failed: {}", poll, self.settlement.max_polls, e);
                }
            }
        }

        Err(ExecutionError::SettlementTimeout {
            coin: coin.to_string(),
            expected,
            observed,
            waited_secs: self.settlement.max_polls as u64
                * self.settlement.poll_interval.as_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::arbitrage::CostBreakdown;
    use crate::domain::testing::{MockCex, MockDex};

    fn opportunity(direction: Direction, coin: &str, capital: f64) -> Opportunity {
        Opportunity {
            coin: coin.to_string(),
            direction,
            capital,
            cex_price: 100.0,
            dex_price: 103.0,
            cex_slippage: 0.0005,
            withdrawal_fee: 0.01,
            projected_out: capital + 20.0,
            expected_profit: 20.0,
            costs: CostBreakdown {
                cex_fee: 1.0,
                cex_slippage: 0.5,
                dex_slippage: 2.0,
                withdrawal_fee: 1.0,
                settlement_cost: 0.05,
            },
            timestamp: chrono::Utc::now(),
        }
    }

    fn fast_settlement() -> SettlementConfig {
        SettlementConfig {
            poll_interval: Duration::from_millis(5),
            max_polls: 5,
            grace: Duration::from_millis(0),
        }
    }

    fn orchestrator(cex: MockCex, dex: MockDex) -> ExecutionOrchestrator {
        ExecutionOrchestrator::new(Arc::new(cex), Arc::new(dex), fast_settlement(), 0.01)
    }

    fn orchestrator_with(cex: Arc<MockCex>, dex: Arc<MockDex>) -> ExecutionOrchestrator {
        ExecutionOrchestrator::new(cex, dex, fast_settlement(), 0.01)
    }

    #[tokio::test]
    async fn cex_to_chain_runs_all_four_steps() {
        let cex = MockCex::new();
        cex.set_balance("USDT", AccountScope::Unified, 1000.0);
        cex.set_price("AAA", 100.0);

        let dex = MockDex::new();
        dex.set_rate("AAA", "USDT", 103.0);
        // filled 10.0 less the 0.01 withdrawal fee, credited after two
        // balance reads (the baseline read plus one poll)
        dex.set_pending_credit("AAA", 9.99, 2);

        let orch = orchestrator(cex, dex);
        let result = orch.execute(&opportunity(Direction::CexToChain, "AAA", 1000.0)).await;

        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.steps.len(), 4);
        assert_eq!(result.steps[0].step, ExecutionStep::SourceTrade);
        assert_eq!(result.steps[3].step, ExecutionStep::DestinationTrade);
        // 9.99 AAA sold at 103 USDT
        let realized = result.realized_profit.unwrap();
        assert!((realized - (9.99 * 103.0 - 1000.0)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn settlement_timeout_aborts_before_the_second_trade() {
        let cex = MockCex::new();
        cex.set_balance("USDT", AccountScope::Unified, 1000.0);
        cex.set_price("AAA", 100.0);

        let dex = Arc::new(MockDex::new());
        dex.set_rate("AAA", "USDT", 103.0);
        // deposit never lands

        let orch = orchestrator_with(Arc::new(cex), Arc::clone(&dex));
        let result = orch.execute(&opportunity(Direction::CexToChain, "AAA", 1000.0)).await;

        assert!(!result.success);
        assert!(matches!(
            result.error,
            Some(ExecutionError::SettlementTimeout { .. })
        ));
        // trade 1 and the transfer ran; nothing was ever sold
        assert_eq!(result.steps.len(), 2);
        assert!(dex.swap_log().is_empty());
    }

    #[tokio::test]
    async fn insufficient_balance_aborts_before_any_order() {
        let cex = MockCex::new();
        cex.set_balance("USDT", AccountScope::Unified, 100.0);
        cex.set_price("AAA", 100.0);

        let orch = orchestrator(cex, MockDex::new());
        let result = orch.execute(&opportunity(Direction::CexToChain, "AAA", 1000.0)).await;

        assert!(!result.success);
        assert!(matches!(
            result.error,
            Some(ExecutionError::InsufficientBalance { .. })
        ));
        assert!(result.steps.is_empty());
    }

    #[tokio::test]
    async fn rejected_order_aborts_with_the_venue_payload() {
        let cex = MockCex::new();
        cex.set_balance("USDT", AccountScope::Unified, 1000.0);
        cex.set_price("AAA", 100.0);
        cex.reject_orders("risk control triggered");

        let orch = orchestrator(cex, MockDex::new());
        let result = orch.execute(&opportunity(Direction::CexToChain, "AAA", 1000.0)).await;

        assert!(!result.success);
        match result.error {
            Some(ExecutionError::OrderRejected { detail, .. }) => {
                assert!(detail.contains("risk control triggered"));
            }
            other => panic!("expected OrderRejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn chain_to_cex_sells_the_credited_deposit() {
        let cex = MockCex::new();
        cex.set_price("AAA", 105.0);
        // deposit credited after the baseline read plus one poll
        cex.set_pending_deposit("AAA", 9.7, 2);

        let dex = MockDex::new();
        dex.set_balance("USDT", 1000.0);
        dex.set_rate("USDT", "AAA", 1.0 / 103.0);

        let orch = orchestrator(cex, dex);
        let result = orch.execute(&opportunity(Direction::ChainToCex, "AAA", 1000.0)).await;

        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.steps.len(), 4);
        // 9.7 AAA sold at 105 on the CEX
        let final_balance = result.final_balance.unwrap();
        assert!((final_balance - 9.7 * 105.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn cancellation_is_observed_between_polls() {
        let cex = MockCex::new();
        cex.set_balance("USDT", AccountScope::Unified, 1000.0);
        cex.set_price("AAA", 100.0);

        let dex = MockDex::new();
        dex.set_rate("AAA", "USDT", 103.0);

        let orch = orchestrator(cex, dex);
        orch.cancel_handle().store(true, Ordering::Relaxed);
        let result = orch.execute(&opportunity(Direction::CexToChain, "AAA", 1000.0)).await;

        assert!(!result.success);
        assert!(matches!(result.error, Some(ExecutionError::Cancelled)));
    }

    #[tokio::test]
    async fn concurrent_attempts_are_single_flight() {
        let cex = MockCex::new();
        cex.set_balance("USDT", AccountScope::Unified, 1000.0);
        cex.set_price("AAA", 100.0);

        let dex = MockDex::new();
        dex.set_rate("AAA", "USDT", 103.0);
        dex.set_pending_credit("AAA", 9.99, 2);

        let orch = Arc::new(orchestrator(cex, dex));
        let opp = opportunity(Direction::CexToChain, "AAA", 1000.0);
        let (first, second) = tokio::join!(orch.execute(&opp), orch.execute(&opp));

        let in_progress = |r: &ExecutionResult| {
            matches!(r.error, Some(ExecutionError::AttemptInProgress))
        };
        assert!(
            in_progress(&first) ^ in_progress(&second),
            "exactly one attempt must be turned away"
        );
    }

    #[tokio::test]
    async fn declining_gate_blocks_the_attempt() {
        struct Deny;
        #[async_trait::async_trait]
        impl ExecutionGate for Deny {
            async fn approve(&self, _opportunity: &Opportunity) -> bool {
                false
            }
        }

        let cex = MockCex::new();
        cex.set_balance("USDT", AccountScope::Unified, 1000.0);
        cex.set_price("AAA", 100.0);

        let orch = orchestrator(cex, MockDex::new()).with_gate(Arc::new(Deny));
        let result = orch.execute(&opportunity(Direction::CexToChain, "AAA", 1000.0)).await;

        assert!(!result.success);
        assert!(matches!(result.error, Some(ExecutionError::Declined)));
        assert!(result.steps.is_empty());
    }
}
