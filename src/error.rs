//! Settlement error taxonomy
//!
//! Every failure a state-machine operation can surface to a caller.
//! All variants are recoverable business failures; invariant violations
//! (a reward attached to a non-rewarded action, ledger over-settlement)
//! are not errors but bugs, logged at ERROR where they are detected.

use thiserror::Error;

/// Errors surfaced by settlement, payout, and gating operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// Operation not legal in the record's current status
    #[error("Invalid transition: cannot {operation} while {status}")]
    InvalidTransition {
        operation: &'static str,
        status: String,
    },

    /// A manual decision was already recorded for this action
    #[error("Already decided: action is {status}")]
    AlreadyDecided { status: String },

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Quest cap reached or payout amount outside the allowed range
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// Blacklist denies the operation
    #[error("Blocked: {0}")]
    Blocked(String),

    /// Payout completion without a tx hash or proof of transfer
    #[error("Insufficient evidence: completion requires a tx hash or proof of transfer")]
    InsufficientEvidence,

    /// Proof payload is missing fields required by the quest type
    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    /// Quest is not accepting claims
    #[error("Quest not open: {0}")]
    QuestNotOpen(String),

    /// Persistence failure
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, SettlementError>;
