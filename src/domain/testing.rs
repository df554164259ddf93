//! Hand-rolled venue mocks for domain tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::domain::venues::{
    CexVenue, DexVenue, OrderBook, OrderFill, SwapExecution, SwapQuote, Withdrawal,
};
use crate::shared::errors::VenueError;
use crate::shared::types::{AccountScope, AmountUnit, OrderSide};

/// Deposit that becomes visible after a number of balance reads
struct PendingCredit {
    asset: String,
    amount: f64,
    reads_left: u32,
}

/// Count one read of `asset` against the pending credit; returns it once
/// the countdown reaches zero
fn tick_pending(slot: &Mutex<Option<PendingCredit>>, asset: &str) -> Option<PendingCredit> {
    let mut pending = slot.lock().unwrap();
    let due = match pending.as_mut() {
        Some(credit) if credit.asset == asset => {
            credit.reads_left = credit.reads_left.saturating_sub(1);
            credit.reads_left == 0
        }
        _ => false,
    };
    if due {
        pending.take()
    } else {
        None
    }
}

/// In-memory CEX with flat per-coin prices and scriptable failures
pub struct MockCex {
    books: Mutex<HashMap<String, OrderBook>>,
    prices: Mutex<HashMap<String, f64>>,
    balances: Mutex<HashMap<(String, AccountScope), f64>>,
    withdrawal_fees: Mutex<HashMap<String, f64>>,
    reject_reason: Mutex<Option<String>>,
    pending_deposit: Mutex<Option<PendingCredit>>,
    withdrawals: Mutex<Vec<(String, f64, String)>>,
    order_counter: Mutex<u32>,
}

impl MockCex {
    pub fn new() -> Self {
        Self {
            books: Mutex::new(HashMap::new()),
            prices: Mutex::new(HashMap::new()),
            balances: Mutex::new(HashMap::new()),
            withdrawal_fees: Mutex::new(HashMap::new()),
            reject_reason: Mutex::new(None),
            pending_deposit: Mutex::new(None),
            withdrawals: Mutex::new(Vec::new()),
            order_counter: Mutex::new(0),
        }
    }

    /// Register a deep symmetric book: both sides quote `price` with
    /// effectively unlimited size, so walks fill at `price` and the
    /// slippage estimate stays negligible
    pub fn set_deep_book(&self, coin: &str, price: f64) {
        self.books.lock().unwrap().insert(
            coin.to_string(),
            OrderBook {
                bids: vec![(price, 1e9)],
                asks: vec![(price, 1e9)],
            },
        );
        self.set_price(coin, price);
    }

    pub fn set_price(&self, coin: &str, price: f64) {
        self.prices.lock().unwrap().insert(coin.to_string(), price);
    }

    pub fn set_balance(&self, asset: &str, scope: AccountScope, amount: f64) {
        self.balances
            .lock()
            .unwrap()
            .insert((asset.to_string(), scope), amount);
    }

    pub fn set_withdrawal_fee(&self, coin: &str, fee: f64) {
        self.withdrawal_fees
            .lock()
            .unwrap()
            .insert(coin.to_string(), fee);
    }

    pub fn reject_orders(&self, reason: &str) {
        *self.reject_reason.lock().unwrap() = Some(reason.to_string());
    }

    /// Credit `amount` of `asset` on the FUND ledger once it has been
    /// read `after_reads` times
    pub fn set_pending_deposit(&self, asset: &str, amount: f64, after_reads: u32) {
        *self.pending_deposit.lock().unwrap() = Some(PendingCredit {
            asset: asset.to_string(),
            amount,
            reads_left: after_reads,
        });
    }

    pub fn withdrawal_log(&self) -> Vec<(String, f64, String)> {
        self.withdrawals.lock().unwrap().clone()
    }

    fn balance_of(&self, asset: &str, scope: AccountScope) -> f64 {
        *self
            .balances
            .lock()
            .unwrap()
            .get(&(asset.to_string(), scope))
            .unwrap_or(&0.0)
    }

    fn adjust(&self, asset: &str, scope: AccountScope, delta: f64) {
        let mut balances = self.balances.lock().unwrap();
        *balances.entry((asset.to_string(), scope)).or_insert(0.0) += delta;
    }
}

#[async_trait]
impl CexVenue for MockCex {
    async fn get_orderbook(&self, coin: &str, _depth: u32) -> Result<OrderBook, VenueError> {
        self.books
            .lock()
            .unwrap()
            .get(coin)
            .cloned()
            .ok_or_else(|| VenueError::QuoteUnavailable(format!("no book for {}", coin)))
    }

    async fn place_market_order(
        &self,
        coin: &str,
        side: OrderSide,
        amount: f64,
        unit: AmountUnit,
    ) -> Result<OrderFill, VenueError> {
        if let Some(reason) = self.reject_reason.lock().unwrap().clone() {
            return Err(VenueError::Rejected(reason));
        }
        let price = *self
            .prices
            .lock()
            .unwrap()
            .get(coin)
            .ok_or_else(|| VenueError::Rejected(format!("no market for {}", coin)))?;

        let filled_qty = match (side, unit) {
            (OrderSide::Buy, AmountUnit::Quote) => {
                let qty = amount / price;
                self.adjust("USDT", AccountScope::Unified, -amount);
                self.adjust(coin, AccountScope::Unified, qty);
                qty
            }
            (OrderSide::Sell, AmountUnit::Base) => {
                self.adjust(coin, AccountScope::Unified, -amount);
                self.adjust("USDT", AccountScope::Unified, amount * price);
                amount
            }
            _ => return Err(VenueError::Rejected("unsupported side/unit".to_string())),
        };

        let mut counter = self.order_counter.lock().unwrap();
        *counter += 1;
        Ok(OrderFill {
            order_id: format!("order-{}", *counter),
            filled_qty,
            avg_price: price,
            raw: json!({"mock": true}),
        })
    }

    async fn get_balance(&self, asset: &str, scope: AccountScope) -> Result<f64, VenueError> {
        if scope == AccountScope::Fund {
            if let Some(credit) = tick_pending(&self.pending_deposit, asset) {
                self.adjust(&credit.asset, AccountScope::Fund, credit.amount);
            }
        }
        Ok(self.balance_of(asset, scope))
    }

    async fn internal_transfer(
        &self,
        asset: &str,
        amount: f64,
        from: AccountScope,
        to: AccountScope,
    ) -> Result<(), VenueError> {
        self.adjust(asset, from, -amount);
        self.adjust(asset, to, amount);
        Ok(())
    }

    async fn withdraw(
        &self,
        asset: &str,
        amount: f64,
        address: &str,
    ) -> Result<Withdrawal, VenueError> {
        self.adjust(asset, AccountScope::Fund, -amount);
        self.withdrawals
            .lock()
            .unwrap()
            .push((asset.to_string(), amount, address.to_string()));
        Ok(Withdrawal {
            withdrawal_id: "wd-1".to_string(),
            raw: json!({"mock": true}),
        })
    }

    async fn get_withdrawal_fee(&self, asset: &str) -> Result<Option<f64>, VenueError> {
        Ok(self.withdrawal_fees.lock().unwrap().get(asset).copied())
    }

    async fn get_deposit_address(&self, _asset: &str) -> Result<String, VenueError> {
        Ok("cex-deposit-address".to_string())
    }
}

/// In-memory aggregator plus wallet with fixed pair rates
pub struct MockDex {
    rates: Mutex<HashMap<(String, String), f64>>,
    failing: Mutex<Vec<String>>,
    balances: Mutex<HashMap<String, f64>>,
    pending_credit: Mutex<Option<PendingCredit>>,
    transfers: Mutex<Vec<(String, f64, String)>>,
    swaps: Mutex<Vec<(String, String, f64)>>,
}

impl MockDex {
    pub fn new() -> Self {
        Self {
            rates: Mutex::new(HashMap::new()),
            failing: Mutex::new(Vec::new()),
            balances: Mutex::new(HashMap::new()),
            pending_credit: Mutex::new(None),
            transfers: Mutex::new(Vec::new()),
            swaps: Mutex::new(Vec::new()),
        }
    }

    pub fn set_rate(&self, input: &str, output: &str, rate: f64) {
        self.rates
            .lock()
            .unwrap()
            .insert((input.to_string(), output.to_string()), rate);
    }

    pub fn fail_quotes_for(&self, coin: &str) {
        self.failing.lock().unwrap().push(coin.to_string());
    }

    pub fn set_balance(&self, asset: &str, amount: f64) {
        self.balances
            .lock()
            .unwrap()
            .insert(asset.to_string(), amount);
    }

    /// Credit `amount` of `asset` once its balance has been read
    /// `after_reads` times
    pub fn set_pending_credit(&self, asset: &str, amount: f64, after_reads: u32) {
        *self.pending_credit.lock().unwrap() = Some(PendingCredit {
            asset: asset.to_string(),
            amount,
            reads_left: after_reads,
        });
    }

    pub fn transfer_log(&self) -> Vec<(String, f64, String)> {
        self.transfers.lock().unwrap().clone()
    }

    pub fn swap_log(&self) -> Vec<(String, String, f64)> {
        self.swaps.lock().unwrap().clone()
    }

    fn rate_for(&self, input: &str, output: &str) -> Result<f64, VenueError> {
        if self.failing.lock().unwrap().iter().any(|c| c == input || c == output) {
            return Err(VenueError::QuoteUnavailable(format!(
                "scripted failure for {}->{}",
                input, output
            )));
        }
        self.rates
            .lock()
            .unwrap()
            .get(&(input.to_string(), output.to_string()))
            .copied()
            .ok_or_else(|| {
                VenueError::QuoteUnavailable(format!("no route {}->{}", input, output))
            })
    }

    fn adjust(&self, asset: &str, delta: f64) {
        let mut balances = self.balances.lock().unwrap();
        *balances.entry(asset.to_string()).or_insert(0.0) += delta;
    }
}

#[async_trait]
impl DexVenue for MockDex {
    async fn get_quote(
        &self,
        input: &str,
        output: &str,
        amount: f64,
    ) -> Result<SwapQuote, VenueError> {
        let rate = self.rate_for(input, output)?;
        Ok(SwapQuote {
            in_amount: amount,
            out_amount: amount * rate,
            raw: json!({"mock": true}),
        })
    }

    async fn swap(
        &self,
        input: &str,
        output: &str,
        amount: f64,
    ) -> Result<SwapExecution, VenueError> {
        let rate = self.rate_for(input, output)?;
        let out = amount * rate;
        self.adjust(input, -amount);
        self.adjust(output, out);
        self.swaps
            .lock()
            .unwrap()
            .push((input.to_string(), output.to_string(), amount));
        Ok(SwapExecution {
            signature: "mock-signature".to_string(),
            in_amount: amount,
            out_amount: out,
            raw: json!({"mock": true}),
        })
    }

    async fn get_balance(&self, asset: &str) -> Result<f64, VenueError> {
        if let Some(credit) = tick_pending(&self.pending_credit, asset) {
            self.adjust(&credit.asset, credit.amount);
        }
        Ok(*self.balances.lock().unwrap().get(asset).unwrap_or(&0.0))
    }

    async fn transfer(
        &self,
        asset: &str,
        amount: f64,
        address: &str,
    ) -> Result<String, VenueError> {
        self.adjust(asset, -amount);
        self.transfers
            .lock()
            .unwrap()
            .push((asset.to_string(), amount, address.to_string()));
        Ok("mock-transfer-signature".to_string())
    }

    fn wallet_address(&self) -> String {
        "mock-wallet-address".to_string()
    }
}
