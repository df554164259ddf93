//! Exchange REST client (v5-style API)
//!
//! The one canonical implementation of the `CexVenue` contract: spot
//! orderbook, sub-ledger balances, market orders, internal transfers,
//! withdrawals and deposit addresses, all against the settlement chain.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::{sleep, Duration};
use tracing::info;

use crate::domain::venues::{CexVenue, OrderBook, OrderFill, Withdrawal};
use crate::infrastructure::cex::signing;
use crate::shared::config::CexCfg;
use crate::shared::errors::VenueError;
use crate::shared::types::{AccountScope, AmountUnit, OrderSide};

/// Chain identifier the exchange uses for the settlement network
const CHAIN: &str = "SOL";

/// Delay before querying the fill of a just-placed market order
const FILL_QUERY_DELAY_MS: u64 = 300;

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg")]
    ret_msg: String,
    #[serde(default)]
    result: Value,
}

impl ApiEnvelope {
    fn into_result(self) -> Result<Value, VenueError> {
        if self.ret_code != 0 {
            return Err(VenueError::Rejected(format!(
                "retCode {}: {}",
                self.ret_code, self.ret_msg
            )));
        }
        Ok(self.result)
    }
}

pub struct BybitClient {
    http: Client,
    api_base: String,
    api_key: String,
    api_secret: String,
    recv_window: u64,
}

impl BybitClient {
    pub fn new(cfg: &CexCfg) -> Self {
        Self {
            http: Client::new(),
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            api_secret: cfg.api_secret.clone(),
            recv_window: cfg.recv_window,
        }
    }

    fn spot_symbol(coin: &str) -> String {
        format!("{}USDT", coin.to_uppercase())
    }

    async fn get_public(&self, path: &str, query: &str) -> Result<Value, VenueError> {
        let url = format!("{}{}?{}", self.api_base, path, query);
        let envelope: ApiEnvelope = self.http.get(&url).send().await?.json().await?;
        envelope.into_result()
    }

    async fn get_signed(&self, path: &str, query: &str) -> Result<Value, VenueError> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let signature = signing::sign(
            &self.api_secret,
            &self.api_key,
            timestamp,
            self.recv_window,
            query,
        );
        let url = format!("{}{}?{}", self.api_base, path, query);
        let envelope: ApiEnvelope = self
            .http
            .get(&url)
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-SIGN", signature)
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-RECV-WINDOW", self.recv_window.to_string())
            .send()
            .await?
            .json()
            .await?;
        envelope.into_result()
    }

    async fn post_signed(&self, path: &str, body: Value) -> Result<Value, VenueError> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let payload = body.to_string();
        let signature = signing::sign(
            &self.api_secret,
            &self.api_key,
            timestamp,
            self.recv_window,
            &payload,
        );
        let url = format!("{}{}", self.api_base, path);
        let envelope: ApiEnvelope = self
            .http
            .post(&url)
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-SIGN", signature)
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-RECV-WINDOW", self.recv_window.to_string())
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        envelope.into_result()
    }

    /// The fill of a market order is not in the create response; query
    /// the realtime order list, falling back to history once the order
    /// has rotated out
    async fn query_fill(&self, order_id: &str) -> Result<(f64, f64, Value), VenueError> {
        sleep(Duration::from_millis(FILL_QUERY_DELAY_MS)).await;

        for path in ["/v5/order/realtime", "/v5/order/history"] {
            let query = format!("category=spot&orderId={}", order_id);
            let result = self.get_signed(path, &query).await?;
            if let Some(order) = result
                .get("list")
                .and_then(|l| l.as_array())
                .and_then(|l| l.first())
            {
                let qty = parse_f64_field(order, "cumExecQty")?;
                let avg_price = parse_f64_field(order, "avgPrice").unwrap_or(0.0);
                return Ok((qty, avg_price, order.clone()));
            }
        }
        Err(VenueError::InvalidResponse(format!(
            "order {} has no execution record",
            order_id
        )))
    }
}

fn parse_f64_field(value: &Value, field: &str) -> Result<f64, VenueError> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| VenueError::InvalidResponse(format!("missing or non-numeric {}", field)))
}

fn parse_levels(result: &Value, key: &str) -> Result<Vec<(f64, f64)>, VenueError> {
    result
        .get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| VenueError::InvalidResponse(format!("orderbook missing {}", key)))?
        .iter()
        .map(|level| {
            let price = level
                .get(0)
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<f64>().ok());
            let size = level
                .get(1)
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<f64>().ok());
            match (price, size) {
                (Some(p), Some(s)) => Ok((p, s)),
                _ => Err(VenueError::InvalidResponse(
                    "unparseable orderbook level".to_string(),
                )),
            }
        })
        .collect()
}

#[async_trait]
impl CexVenue for BybitClient {
    async fn get_orderbook(&self, coin: &str, depth: u32) -> Result<OrderBook, VenueError> {
        let query = format!(
            "category=spot&symbol={}&limit={}",
            Self::spot_symbol(coin),
            depth
        );
        let result = self.get_public("/v5/market/orderbook", &query).await?;
        Ok(OrderBook {
            bids: parse_levels(&result, "b")?,
            asks: parse_levels(&result, "a")?,
        })
    }

    async fn place_market_order(
        &self,
        coin: &str,
        side: OrderSide,
        amount: f64,
        unit: AmountUnit,
    ) -> Result<OrderFill, VenueError> {
        let market_unit = match unit {
            AmountUnit::Base => "baseCoin",
            AmountUnit::Quote => "quoteCoin",
        };
        let body = json!({
            "category": "spot",
            "symbol": Self::spot_symbol(coin),
            "side": side.as_str(),
            "orderType": "Market",
            "qty": amount.to_string(),
            "marketUnit": market_unit,
        });
        info!(
            "📤 {} market order: {} {} ({})",
            side.as_str(),
            amount,
            coin,
            market_unit
        );
        let result = self.post_signed("/v5/order/create", body).await?;
        let order_id = result
            .get("orderId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| VenueError::InvalidResponse("create order returned no orderId".to_string()))?
            .to_string();

        let (filled_qty, avg_price, raw) = self.query_fill(&order_id).await?;
        Ok(OrderFill {
            order_id,
            filled_qty,
            avg_price,
            raw,
        })
    }

    async fn get_balance(&self, asset: &str, scope: AccountScope) -> Result<f64, VenueError> {
        match scope {
            AccountScope::Unified => {
                let query = format!("accountType=UNIFIED&coin={}", asset);
                let result = self.get_signed("/v5/account/wallet-balance", &query).await?;
                let balance = result
                    .get("list")
                    .and_then(|l| l.as_array())
                    .and_then(|l| l.first())
                    .and_then(|account| account.get("coin"))
                    .and_then(|c| c.as_array())
                    .and_then(|c| c.first())
                    .and_then(|entry| parse_f64_field(entry, "walletBalance").ok());
                Ok(balance.unwrap_or(0.0))
            }
            AccountScope::Fund => {
                let query = format!("accountType=FUND&coin={}", asset);
                let result = self
                    .get_signed("/v5/asset/transfer/query-account-coins-balance", &query)
                    .await?;
                let balance = result
                    .get("balance")
                    .and_then(|b| b.as_array())
                    .and_then(|b| b.first())
                    .and_then(|entry| parse_f64_field(entry, "walletBalance").ok());
                Ok(balance.unwrap_or(0.0))
            }
        }
    }

    async fn internal_transfer(
        &self,
        asset: &str,
        amount: f64,
        from: AccountScope,
        to: AccountScope,
    ) -> Result<(), VenueError> {
        let body = json!({
            "transferId": uuid::Uuid::new_v4().to_string(),
            "coin": asset,
            "amount": amount.to_string(),
            "fromAccountType": from.as_str(),
            "toAccountType": to.as_str(),
        });
        info!(
            "🔁 Internal transfer: {} {} {} -> {}",
            amount,
            asset,
            from.as_str(),
            to.as_str()
        );
        self.post_signed("/v5/asset/transfer/inter-transfer", body)
            .await?;
        Ok(())
    }

    async fn withdraw(
        &self,
        asset: &str,
        amount: f64,
        address: &str,
    ) -> Result<Withdrawal, VenueError> {
        let body = json!({
            "coin": asset,
            "chain": CHAIN,
            "address": address,
            "amount": amount.to_string(),
            "timestamp": chrono::Utc::now().timestamp_millis(),
        });
        let result = self.post_signed("/v5/asset/withdraw/create", body).await?;
        let withdrawal_id = result
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| VenueError::InvalidResponse("withdrawal returned no id".to_string()))?
            .to_string();
        Ok(Withdrawal {
            withdrawal_id,
            raw: result,
        })
    }

    async fn get_withdrawal_fee(&self, asset: &str) -> Result<Option<f64>, VenueError> {
        let query = format!("coin={}", asset);
        let result = self.get_signed("/v5/asset/coin/query-info", &query).await?;
        let fee = result
            .get("rows")
            .and_then(|r| r.as_array())
            .and_then(|r| r.first())
            .and_then(|row| row.get("chains"))
            .and_then(|c| c.as_array())
            .and_then(|chains| {
                chains
                    .iter()
                    .find(|c| c.get("chain").and_then(|v| v.as_str()) == Some(CHAIN))
            })
            .and_then(|chain| chain.get("withdrawFee"))
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<f64>().ok());
        Ok(fee)
    }

    async fn get_deposit_address(&self, asset: &str) -> Result<String, VenueError> {
        let query = format!("coin={}&chainType={}", asset, CHAIN);
        let result = self
            .get_signed("/v5/asset/deposit/query-address", &query)
            .await?;
        result
            .get("chains")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|chain| chain.get("addressDeposit"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                VenueError::InvalidResponse(format!("no {} deposit address for {}", CHAIN, asset))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_orderbook_levels() {
        let result = json!({
            "b": [["99.5", "2.0"], ["99.0", "5.5"]],
            "a": [["100.5", "1.0"]],
        });
        let bids = parse_levels(&result, "b").unwrap();
        let asks = parse_levels(&result, "a").unwrap();
        assert_eq!(bids, vec![(99.5, 2.0), (99.0, 5.5)]);
        assert_eq!(asks, vec![(100.5, 1.0)]);
    }

    #[test]
    fn rejects_malformed_levels() {
        let result = json!({"b": [["99.5"]]});
        assert!(parse_levels(&result, "b").is_err());
        assert!(parse_levels(&result, "a").is_err());
    }

    #[test]
    fn envelope_surfaces_the_venue_error_payload() {
        let envelope = ApiEnvelope {
            ret_code: 110007,
            ret_msg: "insufficient available balance".to_string(),
            result: Value::Null,
        };
        let err = envelope.into_result().unwrap_err();
        assert!(err.to_string().contains("110007"));
        assert!(err.to_string().contains("insufficient available balance"));
    }

    #[test]
    fn parses_string_number_fields() {
        let order = json!({"cumExecQty": "9.985", "avgPrice": "100.12"});
        assert_eq!(parse_f64_field(&order, "cumExecQty").unwrap(), 9.985);
        assert!(parse_f64_field(&order, "missing").is_err());
    }
}
