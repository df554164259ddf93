//! Settlement-chain access

pub mod wallet;

pub use wallet::SolanaWallet;
