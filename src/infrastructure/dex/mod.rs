//! Swap aggregator access

pub mod client;

pub use client::JupiterClient;
