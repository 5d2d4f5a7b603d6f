//! Reward Issuance
//!
//! The one place a reward comes into existence. Rewards are keyed by
//! action id, so issuing twice for the same action returns the first
//! reward instead of minting another; the ledger credit and the
//! action's REWARDED transition commit together, the user notification
//! goes out afterwards and is never allowed to fail the issue.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::database::DatabasePool;
use crate::notify::NotificationSender;
use crate::payout::ledger::BalanceLedger;
use crate::settlement::models::{Action, ActionStatus, Quest, Reward, RewardStatus};

pub struct RewardIssuer {
    /// Keyed by action id: the uniqueness that makes issuance idempotent
    rewards: RwLock<HashMap<Uuid, Reward>>,
    ledger: Arc<BalanceLedger>,
    notifier: Arc<NotificationSender>,
    db: Option<Arc<DatabasePool>>,
}

impl RewardIssuer {
    pub fn new(ledger: Arc<BalanceLedger>, notifier: Arc<NotificationSender>) -> Self {
        Self {
            rewards: RwLock::new(HashMap::new()),
            ledger,
            notifier,
            db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<DatabasePool>) -> Self {
        self.db = Some(db);
        self
    }

    /// Issue the reward for a rewarded action.
    ///
    /// Called by the settlement engine as the tail of the REWARDED
    /// transition; the action's status has already flipped under the
    /// engine's write lock. If a reward already exists for this action
    /// the call is a no-op returning it.
    pub async fn issue(&self, action: &Action, quest: &Quest) -> Reward {
        if action.status != ActionStatus::Rewarded {
            // Bug in the transition logic, not a user error.
            error!(
                action_id = %action.id,
                status = action.status.as_str(),
                "Invariant violation: issuing a reward for an action not in rewarded status"
            );
        }

        let (reward, fresh) = {
            let mut rewards = self.rewards.write().await;
            if let Some(existing) = rewards.get(&action.id) {
                (existing.clone(), false)
            } else {
                let reward = Reward {
                    id: Uuid::new_v4(),
                    user_id: action.user_id.clone(),
                    quest_id: action.quest_id,
                    action_id: action.id,
                    asset: quest.reward.asset.clone(),
                    amount: quest.reward.amount,
                    points: quest.reward.points,
                    status: RewardStatus::Completed,
                    created_at: Utc::now(),
                };
                rewards.insert(action.id, reward.clone());
                (reward, true)
            }
        };

        if !fresh {
            return reward;
        }

        self.ledger
            .credit(&reward.user_id, &reward.asset, reward.amount)
            .await;

        info!(
            action_id = %action.id,
            user_id = %reward.user_id,
            asset = %reward.asset,
            amount = reward.amount,
            "Reward issued"
        );

        if let Some(ref db) = self.db {
            if let Err(e) = db.rewards().commit_issue(action, &reward).await {
                warn!(reward_id = %reward.id, error = %e, "Failed to persist reward issue");
            }
        }

        self.notifier.notify(
            &reward.user_id,
            &format!("Quest completed: {} {} credited", reward.amount, reward.asset),
        );

        reward
    }

    pub async fn reward_for_action(&self, action_id: Uuid) -> Option<Reward> {
        let rewards = self.rewards.read().await;
        rewards.get(&action_id).cloned()
    }

    pub async fn rewards_for_user(&self, user_id: &str) -> Vec<Reward> {
        let rewards = self.rewards.read().await;
        let mut list: Vec<_> = rewards
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by_key(|r| r.created_at);
        list
    }

    pub async fn total(&self) -> usize {
        self.rewards.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::models::{QuestType, RewardSpec};

    fn issuer_with_ledger() -> (Arc<BalanceLedger>, RewardIssuer) {
        let ledger = Arc::new(BalanceLedger::new());
        let issuer = RewardIssuer::new(ledger.clone(), Arc::new(NotificationSender::disabled()));
        (ledger, issuer)
    }

    fn rewarded_action(quest: &Quest) -> Action {
        let mut action = Action::claim("user_1", quest.id);
        action.status = ActionStatus::Rewarded;
        action.verified_at = Some(Utc::now());
        action
    }

    fn quest() -> Quest {
        Quest::new(
            "Follow us",
            QuestType::ChannelFollow,
            RewardSpec {
                asset: "USDT".into(),
                amount: 5,
                points: 10,
            },
        )
    }

    #[tokio::test]
    async fn test_issue_credits_ledger_once() {
        let (ledger, issuer) = issuer_with_ledger();
        let quest = quest();
        let action = rewarded_action(&quest);

        let reward = issuer.issue(&action, &quest).await;
        assert_eq!(reward.amount, 5);
        assert_eq!(ledger.balance("user_1", "USDT").await.issued, 5);
    }

    #[tokio::test]
    async fn test_duplicate_issue_is_a_noop() {
        let (ledger, issuer) = issuer_with_ledger();
        let quest = quest();
        let action = rewarded_action(&quest);

        let first = issuer.issue(&action, &quest).await;
        let second = issuer.issue(&action, &quest).await;

        assert_eq!(first.id, second.id);
        assert_eq!(issuer.total().await, 1);
        // Ledger credited exactly once.
        assert_eq!(ledger.balance("user_1", "USDT").await.issued, 5);
    }
}
