//! Utility functions.
//!
//! Small shared helpers used across the bot.

pub mod audit;
pub mod rate_limit;

pub use audit::audit;
pub use rate_limit::TokenBucket;
