//! Solana wallet - key handling, balances and transfers on the
//! settlement chain

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::system_instruction;
use solana_sdk::transaction::{Transaction, VersionedTransaction};
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use tracing::info;

use crate::shared::errors::{AppError, VenueError};

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

fn rpc_error(e: solana_client::client_error::ClientError) -> VenueError {
    VenueError::Network(e.to_string())
}

/// Signing wallet backed by a single keypair
pub struct SolanaWallet {
    rpc: RpcClient,
    keypair: Keypair,
}

impl SolanaWallet {
    pub fn new(rpc_url: &str, secret_key_base58: &str) -> Result<Self, AppError> {
        let bytes = bs58::decode(secret_key_base58)
            .into_vec()
            .map_err(|e| AppError::WalletError(format!("invalid base58 secret key: {}", e)))?;
        let keypair = Keypair::from_bytes(&bytes)
            .map_err(|e| AppError::WalletError(format!("invalid keypair bytes: {}", e)))?;
        let rpc = RpcClient::new_with_commitment(
            rpc_url.to_string(),
            CommitmentConfig::confirmed(),
        );
        Ok(Self { rpc, keypair })
    }

    pub fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub async fn sol_balance(&self) -> Result<f64, VenueError> {
        let lamports = self
            .rpc
            .get_balance(&self.keypair.pubkey())
            .await
            .map_err(rpc_error)?;
        Ok(lamports as f64 / LAMPORTS_PER_SOL)
    }

    /// UI-denominated balance of an SPL token; a wallet without a token
    /// account for the mint holds zero
    pub async fn token_balance(&self, mint: &Pubkey) -> Result<f64, VenueError> {
        let ata = get_associated_token_address(&self.keypair.pubkey(), mint);
        match self.rpc.get_token_account_balance(&ata).await {
            Ok(balance) => Ok(balance.ui_amount.unwrap_or(0.0)),
            Err(_) => Ok(0.0),
        }
    }

    pub async fn transfer_sol(&self, to: &Pubkey, amount: f64) -> Result<String, VenueError> {
        let lamports = (amount * LAMPORTS_PER_SOL) as u64;
        info!("💸 Transferring {} SOL to {}", amount, to);
        let instruction = system_instruction::transfer(&self.keypair.pubkey(), to, lamports);
        self.send_instructions(&[instruction]).await
    }

    /// SPL transfer to the recipient's associated token account,
    /// creating it idempotently when it does not exist yet
    pub async fn transfer_token(
        &self,
        mint: &Pubkey,
        decimals: u8,
        to_owner: &Pubkey,
        amount: f64,
    ) -> Result<String, VenueError> {
        let raw_amount = (amount * 10f64.powi(decimals as i32)) as u64;
        let source = get_associated_token_address(&self.keypair.pubkey(), mint);
        let destination = get_associated_token_address(to_owner, mint);
        info!("💸 Transferring {} of mint {} to {}", amount, mint, to_owner);

        let create_destination = create_associated_token_account_idempotent(
            &self.keypair.pubkey(),
            to_owner,
            mint,
            &spl_token::id(),
        );
        let transfer = spl_token::instruction::transfer_checked(
            &spl_token::id(),
            &source,
            mint,
            &destination,
            &self.keypair.pubkey(),
            &[],
            raw_amount,
            decimals,
        )
        .map_err(|e| VenueError::InvalidResponse(format!("transfer instruction: {}", e)))?;

        self.send_instructions(&[create_destination, transfer]).await
    }

    async fn send_instructions(&self, instructions: &[Instruction]) -> Result<String, VenueError> {
        let blockhash = self.rpc.get_latest_blockhash().await.map_err(rpc_error)?;
        let transaction = Transaction::new_signed_with_payer(
            instructions,
            Some(&self.keypair.pubkey()),
            &[&self.keypair],
            blockhash,
        );
        let signature = self
            .rpc
            .send_and_confirm_transaction(&transaction)
            .await
            .map_err(rpc_error)?;
        Ok(signature.to_string())
    }

    /// Sign and submit a serialized transaction produced by the
    /// aggregator's swap endpoint
    pub async fn sign_and_send_serialized(&self, tx_bytes: &[u8]) -> Result<String, VenueError> {
        let unsigned: VersionedTransaction = bincode::deserialize(tx_bytes)
            .map_err(|e| VenueError::InvalidResponse(format!("undecodable transaction: {}", e)))?;
        let signed = VersionedTransaction::try_new(unsigned.message, &[&self.keypair])
            .map_err(|e| VenueError::InvalidResponse(format!("signing failed: {}", e)))?;
        let signature = self
            .rpc
            .send_and_confirm_transaction(&signed)
            .await
            .map_err(rpc_error)?;
        Ok(signature.to_string())
    }
}
