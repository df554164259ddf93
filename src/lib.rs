//! Crossarb - CEX <-> Solana DEX arbitrage bot
//! Built with Domain-Driven Design principles

pub mod domain;
pub mod infrastructure;
pub mod application;
pub mod shared;

// Re-export main types for convenience
pub use domain::arbitrage::{Opportunity, OpportunityScanner};
pub use domain::execution::{ExecutionOrchestrator, ExecutionResult};
pub use domain::funds::{FundsLocation, LocationTracker};
