//! Centralized exchange access

pub mod client;
pub mod signing;

pub use client::BybitClient;
