//! Risk Gating
//!
//! The trust side of settlement: an append-only event log, a scorer
//! that folds it into a per-user risk level, and a hard deny-list.
//! Claims and payouts consult all three before anything moves.

pub mod blacklist;
pub mod events;
pub mod score;

pub use blacklist::{BlacklistEntry, BlacklistGuard, BlacklistKind, Identifiers};
pub use events::{RiskEvent, RiskEventKind, RiskEventLog, RiskSeverity};
pub use score::{RiskAssessment, RiskLevel, RiskPolicy, RiskScorer};
