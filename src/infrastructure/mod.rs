//! Infrastructure layer - concrete venue clients and reference data

pub mod cex;
pub mod chain;
pub mod dex;
pub mod reference;
