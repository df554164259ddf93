//! Execution domain - the transfer-and-trade state machine

pub mod orchestrator;

pub use orchestrator::{ExecutionOrchestrator, SettlementConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::arbitrage::Opportunity;
use crate::shared::errors::ExecutionError;
use crate::shared::types::Direction;

/// Steps of one execution attempt, in the only order they may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStep {
    /// Market order at the source venue for the full committed capital
    SourceTrade,
    /// Sub-ledger move plus withdrawal, or signed on-chain transfer
    TransferOut,
    /// Bounded polling for the deposit at the destination venue
    AwaitSettlement,
    /// Sell the entire confirmed destination-side balance
    DestinationTrade,
}

impl ExecutionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStep::SourceTrade => "source-trade",
            ExecutionStep::TransferOut => "transfer-out",
            ExecutionStep::AwaitSettlement => "await-settlement",
            ExecutionStep::DestinationTrade => "destination-trade",
        }
    }
}

/// Record of one completed step, with the raw venue response kept for
/// manual recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: ExecutionStep,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub detail: serde_json::Value,
}

/// Final report of one execution attempt.
///
/// Append-only while the attempt runs, immutable once returned. The
/// attempt id doubles as an idempotency key: a restarted process can
/// inspect a persisted result before deciding whether to re-enter the
/// settlement wait or write the attempt off.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub attempt_id: Uuid,
    pub direction: Direction,
    pub coin: String,
    pub steps: Vec<StepRecord>,
    /// Settlement-currency balance at the source venue before the run
    pub initial_balance: Option<f64>,
    /// Settlement-currency balance at the destination venue after the run
    pub final_balance: Option<f64>,
    pub expected_profit: f64,
    pub realized_profit: Option<f64>,
    pub success: bool,
    pub error: Option<ExecutionError>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

/// Optional manual override hook consulted before any capital moves.
///
/// Execution proceeds automatically when no gate is installed.
#[async_trait]
pub trait ExecutionGate: Send + Sync {
    /// Return false to decline the attempt
    async fn approve(&self, opportunity: &Opportunity) -> bool;
}
