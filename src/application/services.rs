//! Application services and use cases

use std::sync::Arc;

use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::domain::arbitrage::{FeeSchedule, Opportunity, OpportunityScanner};
use crate::domain::execution::{ExecutionOrchestrator, ExecutionResult, SettlementConfig};
use crate::domain::funds::{FundsLocation, Location, LocationTracker};
use crate::domain::venues::{CexVenue, DexVenue};
use crate::infrastructure::cex::BybitClient;
use crate::infrastructure::chain::SolanaWallet;
use crate::infrastructure::dex::JupiterClient;
use crate::infrastructure::reference::TokenCatalog;
use crate::shared::config::Config;
use crate::shared::errors::{AppError, ExecutionError};
use crate::shared::types::{AccountScope, SETTLEMENT_CURRENCY};

/// Wires the venue clients into the decision and execution components
/// and drives the locate -> scan -> execute cycle
pub struct ArbitrageService {
    config: Config,
    cex: Arc<dyn CexVenue>,
    dex: Arc<dyn DexVenue>,
    tracker: LocationTracker,
    scanner: OpportunityScanner,
    orchestrator: ExecutionOrchestrator,
}

impl ArbitrageService {
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let catalog = Arc::new(TokenCatalog::from_file(&config.reference.overlap_file)?);
        info!("📚 Loaded {} tokens from reference data", catalog.len());

        let transferable = catalog.transferable_symbols();
        for coin in &config.trade.candidates {
            if catalog.get(coin).is_none() {
                return Err(AppError::ConfigError(format!(
                    "candidate {} is not in the reference data",
                    coin
                )));
            }
            if !transferable.contains(coin) {
                warn!("⚠️  Candidate {} is not transferable between the venues", coin);
            }
        }

        let wallet = Arc::new(SolanaWallet::new(
            &config.chain.rpc_url,
            &config.chain.secret_key,
        )?);
        info!("🔑 Chain wallet: {}", wallet.address());

        let cex: Arc<dyn CexVenue> = Arc::new(BybitClient::new(&config.cex));
        let dex: Arc<dyn DexVenue> = Arc::new(JupiterClient::new(
            &config.dex.quote_api_base,
            wallet,
            Arc::clone(&catalog),
        ));

        let fees = FeeSchedule {
            cex_fee_rate: config.cex.fee_rate,
            settlement_cost: config.chain.settlement_cost,
            dex_slippage_outbound: config.dex.slippage_outbound,
            dex_slippage_inbound: config.dex.slippage_inbound,
        };

        let tracker = LocationTracker::new(
            Arc::clone(&cex),
            Arc::clone(&dex),
            config.funds.presence_threshold,
        );
        let scanner = OpportunityScanner::new(
            Arc::clone(&cex),
            Arc::clone(&dex),
            fees,
            config.trade.orderbook_depth,
        );
        let orchestrator = ExecutionOrchestrator::new(
            Arc::clone(&cex),
            Arc::clone(&dex),
            SettlementConfig {
                poll_interval: Duration::from_secs(config.settlement.poll_interval_secs),
                max_polls: config.settlement.max_polls,
                grace: Duration::from_secs(config.settlement.grace_secs),
            },
            config.chain.fee_reserve_sol,
        );

        Ok(Self {
            config,
            cex,
            dex,
            tracker,
            scanner,
            orchestrator,
        })
    }

    pub async fn locate(&self) -> Result<FundsLocation, AppError> {
        Ok(self.tracker.locate().await?)
    }

    /// Scan the one direction the current capital position allows
    pub async fn scan_feasible(&self) -> Result<Option<Opportunity>, AppError> {
        let location = self.tracker.locate().await?;
        match location.executable_direction() {
            Some(direction) => {
                let best = self
                    .scanner
                    .scan(
                        &self.config.trade.candidates,
                        location.available_capital(),
                        direction,
                        self.config.trade.min_profit_threshold,
                    )
                    .await?;
                Ok(best)
            }
            None if location.location == Location::Split => Err(ExecutionError::SplitFunds {
                cex_usdt: location.cex_usdt,
                chain_usdt: location.chain_usdt,
            }
            .into()),
            None => {
                warn!("💤 No meaningful balance on either venue, nothing to scan");
                Ok(None)
            }
        }
    }

    /// One full cycle: locate, scan, and optionally execute the best
    /// opportunity
    pub async fn run_once(&self, execute: bool) -> Result<Option<ExecutionResult>, AppError> {
        let opportunity = match self.scan_feasible().await? {
            Some(opportunity) => opportunity,
            None => return Ok(None),
        };

        if !execute {
            info!(
                "🧪 Dry run: would execute {} {} for projected ${:.2}",
                opportunity.direction, opportunity.coin, opportunity.expected_profit
            );
            return Ok(None);
        }

        let result = self.orchestrator.execute(&opportunity).await;
        Ok(Some(result))
    }

    /// Continuous monitoring loop. Stops on an aborted execution: the
    /// capital position may be ambiguous afterwards and needs a human
    /// look before another attempt.
    pub async fn run_loop(
        &self,
        interval_secs: u64,
        max_iterations: Option<u32>,
        execute: bool,
    ) -> Result<(), AppError> {
        info!(
            "🤖 Starting arbitrage loop: interval {}s, mode {}",
            interval_secs,
            if execute { "LIVE" } else { "dry run" }
        );

        let mut round = 0u32;
        loop {
            round += 1;
            info!("🔄 Round {}", round);

            match self.run_once(execute).await {
                Ok(Some(result)) if result.success => {
                    info!(
                        "🎯 Round {} executed {}; the capital changed venues, the next round scans the opposite direction",
                        round, result.coin
                    );
                }
                Ok(Some(result)) => {
                    error!(
                        "🛑 Execution aborted ({:?}); manual check required before continuing",
                        result.error
                    );
                    return Ok(());
                }
                Ok(None) => {}
                Err(AppError::ExecutionError(e @ ExecutionError::SplitFunds { .. })) => {
                    error!("🛑 {}; run the consolidate command first", e);
                    return Ok(());
                }
                Err(e) => {
                    warn!("⚠️  Round {} failed: {}", round, e);
                }
            }

            if let Some(max) = max_iterations {
                if round >= max {
                    info!("✅ Completed {} rounds", round);
                    return Ok(());
                }
            }
            sleep(Duration::from_secs(interval_secs)).await;
        }
    }

    /// Sweep the settlement currency to one venue so a blocked Split
    /// position can be resolved. Never runs implicitly.
    pub async fn consolidate(&self, target: Location) -> Result<(), AppError> {
        match target {
            Location::Cex => {
                let balance = self.dex.get_balance(SETTLEMENT_CURRENCY).await?;
                if balance <= self.config.funds.presence_threshold {
                    info!("💤 Chain balance ${:.2} is dust, nothing to consolidate", balance);
                    return Ok(());
                }
                let address = self.cex.get_deposit_address(SETTLEMENT_CURRENCY).await?;
                info!("📦 Consolidating ${:.2} from chain to the exchange", balance);
                let signature = self
                    .dex
                    .transfer(SETTLEMENT_CURRENCY, balance, &address)
                    .await?;
                info!("✅ Transfer sent: {}", signature);
                Ok(())
            }
            Location::Chain => {
                let unified = self
                    .cex
                    .get_balance(SETTLEMENT_CURRENCY, AccountScope::Unified)
                    .await?;
                if unified > 0.0 {
                    self.cex
                        .internal_transfer(
                            SETTLEMENT_CURRENCY,
                            unified,
                            AccountScope::Unified,
                            AccountScope::Fund,
                        )
                        .await?;
                }
                let fund = self
                    .cex
                    .get_balance(SETTLEMENT_CURRENCY, AccountScope::Fund)
                    .await?;
                if fund <= self.config.funds.presence_threshold {
                    info!("💤 Exchange balance ${:.2} is dust, nothing to consolidate", fund);
                    return Ok(());
                }
                info!("📦 Consolidating ${:.2} from the exchange to chain", fund);
                let withdrawal = self
                    .cex
                    .withdraw(SETTLEMENT_CURRENCY, fund, &self.dex.wallet_address())
                    .await?;
                info!("✅ Withdrawal initiated: {}", withdrawal.withdrawal_id);
                Ok(())
            }
            Location::Split | Location::Empty => Err(AppError::ConfigError(
                "consolidation target must be cex or chain".to_string(),
            )),
        }
    }
}
