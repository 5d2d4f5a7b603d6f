//! Questline Settlement Core
//!
//! Quest-completion settlement: users claim quests, submit proof, get
//! verified automatically or by an admin, accumulate reward balance,
//! and withdraw it through an admin-approved payout pipeline. Claims
//! and payouts are gated by a risk scorer and a blacklist.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server entrypoint
//! ├── config.rs      - Configuration management
//! ├── error.rs       - Settlement error taxonomy
//! ├── settlement/    - Action state machine
//! │   ├── engine.rs     - Claim/submit/approve/reject lifecycle
//! │   ├── reward.rs     - Reward issuance (exactly once per action)
//! │   ├── review.rs     - Auto-verify vs manual-review routing
//! │   └── models.rs     - Quests, actions, proofs, rewards
//! ├── payout/        - Withdrawal pipeline
//! │   ├── engine.rs     - Payout state machine
//! │   ├── ledger.rs     - Issued/earmarked/withdrawn balances
//! │   └── models.rs     - Payout records
//! ├── risk/          - Trust gating
//! │   ├── score.rs      - Risk scores and levels
//! │   ├── events.rs     - Append-only risk event log
//! │   └── blacklist.rs  - User/device/IP deny-list
//! ├── oracle.rs      - External verification client
//! ├── notify.rs      - Best-effort user notifications
//! ├── api/           - HTTP API endpoints
//! │   ├── actions.rs    - Claims, submissions, review queue
//! │   ├── payouts.rs    - Withdrawals and balances
//! │   └── risk.rs       - Scores, blacklist admin, stats
//! └── database/      - PostgreSQL persistence
//! ```

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod notify;
pub mod oracle;
pub mod payout;
pub mod risk;
pub mod settlement;

// Re-export main types for convenience
pub use config::Config;
pub use database::DatabasePool;
pub use error::{Result, SettlementError};
pub use notify::NotificationSender;
pub use oracle::{FixedVerdictOracle, HttpVerificationOracle, VerificationOracle};
pub use payout::{AssetBalance, BalanceLedger, Payout, PayoutManager, PayoutPolicy, PayoutStatus};
pub use risk::{
    BlacklistEntry, BlacklistGuard, BlacklistKind, Identifiers, RiskAssessment, RiskEvent,
    RiskEventKind, RiskEventLog, RiskLevel, RiskPolicy, RiskScorer, RiskSeverity,
};
pub use settlement::{
    Action, ActionProof, ActionStatus, Quest, QuestStatus, QuestTarget, QuestType, ReviewGate,
    Reward, RewardIssuer, RewardSpec, SettlementManager, SubmitOutcome,
};

// Re-export API types
pub use api::{
    create_actions_router, create_payouts_router, create_risk_router, ActionsApiState,
    PayoutsApiState, RiskApiState,
};
