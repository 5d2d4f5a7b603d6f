//! PostgreSQL Persistence
//!
//! Write-through repositories behind the in-process managers. The
//! managers stay authoritative; these mirror state so it survives a
//! restart, with conditional updates guarding decided records.

pub mod actions;
pub mod blacklist;
pub mod payouts;
pub mod pool;
pub mod quests;
pub mod rewards;
pub mod risk_events;

pub use actions::ActionRepository;
pub use blacklist::BlacklistRepository;
pub use payouts::PayoutRepository;
pub use pool::DatabasePool;
pub use quests::QuestRepository;
pub use rewards::RewardRepository;
pub use risk_events::RiskEventRepository;
