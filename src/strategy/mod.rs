//! Advisory strategies: where to sell, and how creditworthy the plan is.

pub mod arbitrage;
pub mod credit;

pub use arbitrage::{ArbitrageConfig, ArbitrageRecommender};
pub use credit::CreditScorer;
