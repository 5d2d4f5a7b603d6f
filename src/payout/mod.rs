//! Payout Pipeline
//!
//! The balance ledger and the withdrawal state machine that draws on it.

pub mod engine;
pub mod ledger;
pub mod models;

pub use engine::{PayoutManager, PayoutPolicy};
pub use ledger::{AssetBalance, BalanceLedger};
pub use models::{Payout, PayoutStatus};
