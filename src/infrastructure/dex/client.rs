//! Swap aggregator client (Jupiter-style quote/swap API)
//!
//! Quotes are fee-inclusive: the returned output amount already accounts
//! for route and LP fees. Swaps come back as a serialized transaction
//! that the wallet signs and submits.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use tracing::info;

use crate::domain::venues::{DexVenue, SwapExecution, SwapQuote};
use crate::infrastructure::chain::SolanaWallet;
use crate::infrastructure::reference::{TokenCatalog, TokenEntry};
use crate::shared::errors::VenueError;
use crate::shared::types::NATIVE_TOKEN;

/// Slippage limit baked into swap transactions, in basis points
const SWAP_SLIPPAGE_BPS: u32 = 50;

pub struct JupiterClient {
    http: Client,
    api_base: String,
    wallet: Arc<SolanaWallet>,
    catalog: Arc<TokenCatalog>,
}

impl JupiterClient {
    pub fn new(api_base: &str, wallet: Arc<SolanaWallet>, catalog: Arc<TokenCatalog>) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            wallet,
            catalog,
        }
    }

    fn token(&self, symbol: &str) -> Result<TokenEntry, VenueError> {
        self.catalog
            .get(symbol)
            .cloned()
            .ok_or_else(|| VenueError::UnknownAsset(symbol.to_string()))
    }

    fn mint(&self, entry: &TokenEntry) -> Result<Pubkey, VenueError> {
        Pubkey::from_str(&entry.mint)
            .map_err(|e| VenueError::InvalidResponse(format!("bad mint for {}: {}", entry.symbol, e)))
    }

    /// Fetch a quote; returns the raw payload (needed verbatim by the
    /// swap endpoint) plus the UI-denominated amounts
    async fn fetch_quote(
        &self,
        input: &TokenEntry,
        output: &TokenEntry,
        amount: f64,
    ) -> Result<(Value, f64, f64), VenueError> {
        let amount_raw = (amount * 10f64.powi(input.decimals as i32)) as u64;
        let url = format!("{}/quote", self.api_base);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("inputMint", input.mint.as_str()),
                ("outputMint", output.mint.as_str()),
                ("amount", &amount_raw.to_string()),
                ("slippageBps", &SWAP_SLIPPAGE_BPS.to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(VenueError::QuoteUnavailable(format!(
                "quote request returned status {}",
                response.status()
            )));
        }
        let body: Value = response.json().await?;
        if let Some(error) = body.get("error") {
            return Err(VenueError::QuoteUnavailable(error.to_string()));
        }

        let in_amount = raw_amount(&body, "inAmount", input.decimals)?;
        let out_amount = raw_amount(&body, "outAmount", output.decimals)?;
        Ok((body, in_amount, out_amount))
    }
}

fn raw_amount(body: &Value, field: &str, decimals: u8) -> Result<f64, VenueError> {
    let raw = body
        .get(field)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| VenueError::InvalidResponse(format!("quote missing {}", field)))?;
    Ok(raw / 10f64.powi(decimals as i32))
}

#[async_trait]
impl DexVenue for JupiterClient {
    async fn get_quote(
        &self,
        input: &str,
        output: &str,
        amount: f64,
    ) -> Result<SwapQuote, VenueError> {
        let input_token = self.token(input)?;
        let output_token = self.token(output)?;
        let (raw, in_amount, out_amount) =
            self.fetch_quote(&input_token, &output_token, amount).await?;
        Ok(SwapQuote {
            in_amount,
            out_amount,
            raw,
        })
    }

    async fn swap(
        &self,
        input: &str,
        output: &str,
        amount: f64,
    ) -> Result<SwapExecution, VenueError> {
        let input_token = self.token(input)?;
        let output_token = self.token(output)?;
        let (quote, in_amount, out_amount) =
            self.fetch_quote(&input_token, &output_token, amount).await?;

        info!(
            "🔄 Swapping {:.6} {} -> ~{:.6} {}",
            in_amount, input, out_amount, output
        );

        let url = format!("{}/swap", self.api_base);
        let body = json!({
            "quoteResponse": quote,
            "userPublicKey": self.wallet.address().to_string(),
            "wrapAndUnwrapSol": true,
        });
        let response: Value = self.http.post(&url).json(&body).send().await?.json().await?;
        let encoded = response
            .get("swapTransaction")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                VenueError::InvalidResponse("swap response carries no transaction".to_string())
            })?;
        let tx_bytes = BASE64
            .decode(encoded)
            .map_err(|e| VenueError::InvalidResponse(format!("bad transaction encoding: {}", e)))?;

        let signature = self.wallet.sign_and_send_serialized(&tx_bytes).await?;
        info!("✅ Swap confirmed: {}", signature);

        Ok(SwapExecution {
            signature,
            in_amount,
            out_amount,
            raw: response,
        })
    }

    async fn get_balance(&self, asset: &str) -> Result<f64, VenueError> {
        if asset == NATIVE_TOKEN {
            return self.wallet.sol_balance().await;
        }
        let entry = self.token(asset)?;
        let mint = self.mint(&entry)?;
        self.wallet.token_balance(&mint).await
    }

    async fn transfer(
        &self,
        asset: &str,
        amount: f64,
        address: &str,
    ) -> Result<String, VenueError> {
        let to = Pubkey::from_str(address)
            .map_err(|e| VenueError::InvalidResponse(format!("bad destination address: {}", e)))?;
        if asset == NATIVE_TOKEN {
            return self.wallet.transfer_sol(&to, amount).await;
        }
        let entry = self.token(asset)?;
        let mint = self.mint(&entry)?;
        self.wallet
            .transfer_token(&mint, entry.decimals, &to, amount)
            .await
    }

    fn wallet_address(&self) -> String {
        self.wallet.address().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_raw_amounts_by_decimals() {
        let body = json!({"inAmount": "1000000000", "outAmount": "103500000"});
        assert_eq!(raw_amount(&body, "inAmount", 9).unwrap(), 1.0);
        assert_eq!(raw_amount(&body, "outAmount", 6).unwrap(), 103.5);
    }

    #[test]
    fn missing_amount_is_an_invalid_response() {
        let body = json!({"inAmount": "1000000000"});
        assert!(raw_amount(&body, "outAmount", 6).is_err());
    }
}
