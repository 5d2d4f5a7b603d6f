//! Settlement Data Models
//!
//! Quests, actions, and rewards. An Action is one user's attempt at one
//! quest; it is created on claim, mutated only by the state machine, and
//! never deleted. A Reward is immutable and keyed by its action, which
//! is what makes reward issuance idempotent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Result, SettlementError};

/// Task kinds the marketplace knows how to settle.
///
/// Closed set: anything a client sends that is not recognized lands on
/// `Other`, which always routes to manual review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestType {
    ChannelFollow,
    Retweet,
    ChainTransfer,
    ScreenshotUpload,
    #[serde(other)]
    Other,
}

impl QuestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestType::ChannelFollow => "channel_follow",
            QuestType::Retweet => "retweet",
            QuestType::ChainTransfer => "chain_transfer",
            QuestType::ScreenshotUpload => "screenshot_upload",
            QuestType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "channel_follow" => QuestType::ChannelFollow,
            "retweet" => QuestType::Retweet,
            "chain_transfer" => QuestType::ChainTransfer,
            "screenshot_upload" => QuestType::ScreenshotUpload,
            _ => QuestType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Draft,
    Active,
    Paused,
    Ended,
}

impl QuestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestStatus::Draft => "draft",
            QuestStatus::Active => "active",
            QuestStatus::Paused => "paused",
            QuestStatus::Ended => "ended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(QuestStatus::Draft),
            "active" => Some(QuestStatus::Active),
            "paused" => Some(QuestStatus::Paused),
            "ended" => Some(QuestStatus::Ended),
            _ => None,
        }
    }
}

/// What completing the quest pays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardSpec {
    pub asset: String,
    pub amount: i64,
    pub points: i64,
}

/// What the quest is about, per type. Unused fields stay None.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestTarget {
    /// Channel or account to follow
    pub channel: Option<String>,
    /// Post to retweet
    pub post_url: Option<String>,
    /// Contract or recipient for on-chain transfers
    pub contract_address: Option<String>,
    /// Minimum transfer amount for on-chain quests
    pub min_transfer_amount: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quest {
    pub id: Uuid,
    pub title: String,
    pub quest_type: QuestType,
    pub reward: RewardSpec,
    /// Max REWARDED actions per user; 0 means unlimited
    pub per_user_cap: u32,
    /// Max REWARDED actions per UTC day across all users; 0 means unlimited
    pub daily_cap: u32,
    pub status: QuestStatus,
    pub target: QuestTarget,
    pub created_at: DateTime<Utc>,
}

impl Quest {
    pub fn new(title: &str, quest_type: QuestType, reward: RewardSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            quest_type,
            reward,
            per_user_cap: 1,
            daily_cap: 0,
            status: QuestStatus::Draft,
            target: QuestTarget::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_caps(mut self, per_user_cap: u32, daily_cap: u32) -> Self {
        self.per_user_cap = per_user_cap;
        self.daily_cap = daily_cap;
        self
    }

    pub fn with_status(mut self, status: QuestStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_target(mut self, target: QuestTarget) -> Self {
        self.target = target;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Claimed,
    Submitted,
    Rewarded,
    Rejected,
}

impl ActionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionStatus::Rewarded | ActionStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Claimed => "claimed",
            ActionStatus::Submitted => "submitted",
            ActionStatus::Rewarded => "rewarded",
            ActionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "claimed" => Some(ActionStatus::Claimed),
            "submitted" => Some(ActionStatus::Submitted),
            "rewarded" => Some(ActionStatus::Rewarded),
            "rejected" => Some(ActionStatus::Rejected),
            _ => None,
        }
    }
}

/// Evidence submitted for one attempt. Which fields are required depends
/// on the quest type; validation happens at the state-machine boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionProof {
    /// Social account handle (follows, retweets)
    pub account_handle: Option<String>,
    /// URL of the retweeted/shared post
    pub post_url: Option<String>,
    /// On-chain transaction hash
    pub tx_hash: Option<String>,
    /// Uploaded artifact reference (screenshots)
    pub artifact_url: Option<String>,
    pub note: Option<String>,
}

impl ActionProof {
    /// Check the fields this quest type requires
    pub fn validate_for(&self, quest_type: QuestType) -> Result<()> {
        let missing = |field: &str| {
            Err(SettlementError::InvalidProof(format!(
                "{} requires {}",
                quest_type.as_str(),
                field
            )))
        };

        match quest_type {
            QuestType::ChannelFollow => {
                if self.account_handle.is_none() {
                    return missing("account_handle");
                }
            }
            QuestType::Retweet => {
                if self.account_handle.is_none() {
                    return missing("account_handle");
                }
                if self.post_url.is_none() {
                    return missing("post_url");
                }
            }
            QuestType::ChainTransfer => {
                if self.tx_hash.is_none() {
                    return missing("tx_hash");
                }
            }
            QuestType::ScreenshotUpload => {
                if self.artifact_url.is_none() {
                    return missing("artifact_url");
                }
            }
            QuestType::Other => {
                if self.account_handle.is_none()
                    && self.post_url.is_none()
                    && self.tx_hash.is_none()
                    && self.artifact_url.is_none()
                    && self.note.is_none()
                {
                    return Err(SettlementError::InvalidProof(
                        "proof must carry at least one field".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Stable content digest for duplicate detection
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, value) in [
            ("account_handle", &self.account_handle),
            ("post_url", &self.post_url),
            ("tx_hash", &self.tx_hash),
            ("artifact_url", &self.artifact_url),
            ("note", &self.note),
        ] {
            if let Some(v) = value {
                hasher.update(name.as_bytes());
                hasher.update(b"=");
                hasher.update(v.as_bytes());
                hasher.update(b"\n");
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

/// One user's attempt at one quest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    pub user_id: String,
    pub quest_id: Uuid,
    pub status: ActionStatus,
    pub proof: Option<ActionProof>,
    pub proof_digest: Option<String>,
    /// Set at submit time: manual review forced by the gate or by
    /// duplicate-proof detection
    pub review_required: bool,
    pub reject_reason: Option<String>,
    pub claimed_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl Action {
    pub fn claim(user_id: &str, quest_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            quest_id,
            status: ActionStatus::Claimed,
            proof: None,
            proof_digest: None,
            review_required: false,
            reject_reason: None,
            claimed_at: Utc::now(),
            submitted_at: None,
            verified_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardStatus {
    Completed,
}

impl RewardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardStatus::Completed => "completed",
        }
    }
}

/// Issued exactly once per rewarded action; immutable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reward {
    pub id: Uuid,
    pub user_id: String,
    pub quest_id: Uuid,
    /// Unique: at most one reward per action
    pub action_id: Uuid,
    pub asset: String,
    pub amount: i64,
    pub points: i64,
    pub status: RewardStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_validation_per_type() {
        let follow = ActionProof {
            account_handle: Some("@user".into()),
            ..Default::default()
        };
        assert!(follow.validate_for(QuestType::ChannelFollow).is_ok());
        assert!(follow.validate_for(QuestType::Retweet).is_err());
        assert!(follow.validate_for(QuestType::ChainTransfer).is_err());

        let transfer = ActionProof {
            tx_hash: Some("0xabc".into()),
            ..Default::default()
        };
        assert!(transfer.validate_for(QuestType::ChainTransfer).is_ok());

        let empty = ActionProof::default();
        assert!(empty.validate_for(QuestType::Other).is_err());
    }

    #[test]
    fn test_proof_digest_is_stable_and_content_sensitive() {
        let a = ActionProof {
            tx_hash: Some("0xabc".into()),
            ..Default::default()
        };
        let b = ActionProof {
            tx_hash: Some("0xabc".into()),
            ..Default::default()
        };
        let c = ActionProof {
            tx_hash: Some("0xdef".into()),
            ..Default::default()
        };

        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
    }

    #[test]
    fn test_unknown_quest_type_parses_to_other() {
        assert_eq!(QuestType::parse("telegram_join"), QuestType::Other);
        assert_eq!(QuestType::parse("retweet"), QuestType::Retweet);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!ActionStatus::Claimed.is_terminal());
        assert!(!ActionStatus::Submitted.is_terminal());
        assert!(ActionStatus::Rewarded.is_terminal());
        assert!(ActionStatus::Rejected.is_terminal());
    }
}
