//! Error handling for the application

use thiserror::Error;

/// Venue access errors (CEX REST API, DEX aggregator, chain RPC)
#[derive(Error, Debug, Clone)]
pub enum VenueError {
    #[error("Quote unavailable: {0}")]
    QuoteUnavailable(String),

    #[error("Venue rejected request: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response payload: {0}")]
    InvalidResponse(String),

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),
}

/// Scan-level errors
#[derive(Error, Debug, Clone)]
pub enum ScanError {
    #[error("Profit threshold must be strictly positive, got {0}")]
    InvalidThreshold(f64),

    #[error("No candidate assets configured")]
    NoCandidates,
}

/// Execution-related errors
#[derive(Error, Debug, Clone)]
pub enum ExecutionError {
    #[error("Insufficient balance on {venue}: have {have} {asset}, need {need}")]
    InsufficientBalance {
        venue: String,
        asset: String,
        have: f64,
        need: f64,
    },

    #[error("Order rejected on {venue} for {coin}: {detail}")]
    OrderRejected {
        venue: String,
        coin: String,
        detail: String,
    },

    #[error("Transfer of {amount} {coin} out of {venue} failed: {detail}")]
    TransferFailed {
        venue: String,
        coin: String,
        amount: f64,
        detail: String,
    },

    #[error("Settlement timeout for {coin}: expected ~{expected}, observed rise {observed} after {waited_secs}s")]
    SettlementTimeout {
        coin: String,
        expected: f64,
        observed: f64,
        waited_secs: u64,
    },

    #[error("Funds split across venues (cex: {cex_usdt} USDT, chain: {chain_usdt} USDT), consolidate first")]
    SplitFunds { cex_usdt: f64, chain_usdt: f64 },

    #[error("Another execution attempt is already in flight")]
    AttemptInProgress,

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Execution declined by confirmation gate")]
    Declined,

    #[error("Venue error during {step}: {source}")]
    Venue {
        step: String,
        #[source]
        source: VenueError,
    },
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Reference data error: {0}")]
    ReferenceError(String),

    #[error("Wallet error: {0}")]
    WalletError(String),

    #[error("Venue error: {0}")]
    VenueError(#[from] VenueError),

    #[error("Scan error: {0}")]
    ScanError(#[from] ScanError),

    #[error("Execution error: {0}")]
    ExecutionError(#[from] ExecutionError),
}

impl From<reqwest::Error> for VenueError {
    fn from(err: reqwest::Error) -> Self {
        VenueError::Network(err.to_string())
    }
}
