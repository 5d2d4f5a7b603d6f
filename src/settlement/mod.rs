//! Settlement Pipeline
//!
//! The action state machine, the review gate that routes submissions,
//! and the reward issuer that pays exactly once per approved attempt.

pub mod engine;
pub mod models;
pub mod review;
pub mod reward;

pub use engine::{SettlementManager, SubmitOutcome};
pub use models::{
    Action, ActionProof, ActionStatus, Quest, QuestStatus, QuestTarget, QuestType, Reward,
    RewardSpec, RewardStatus,
};
pub use review::{ReviewGate, VerificationRoute};
pub use reward::RewardIssuer;
