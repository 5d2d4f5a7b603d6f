//! Action State Machine
//!
//! Lifecycle of one attempt: CLAIMED → SUBMITTED → {REWARDED | REJECTED}.
//! Entry is gated by the blacklist and quest caps; verification routes
//! through the review gate to either the oracle or the manual queue.
//! Every transition re-reads the current status under the write lock,
//! so a concurrent decision on the same action fails cleanly instead of
//! double-applying.

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::DatabasePool;
use crate::error::{Result, SettlementError};
use crate::oracle::VerificationOracle;
use crate::risk::{
    BlacklistGuard, Identifiers, RiskEvent, RiskEventKind, RiskEventLog, RiskPolicy, RiskSeverity,
};
use crate::settlement::models::{
    Action, ActionProof, ActionStatus, Quest, QuestStatus, Reward,
};
use crate::settlement::review::ReviewGate;
use crate::settlement::reward::RewardIssuer;

/// What happened to a submission
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Oracle confirmed; reward issued
    Rewarded(Reward),
    /// Waiting for a human decision
    PendingReview,
    /// Oracle did not confirm yet; the action stays submitted and the
    /// submission can be retried
    PendingVerification,
}

impl SubmitOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitOutcome::Rewarded(_) => "rewarded",
            SubmitOutcome::PendingReview => "pending_review",
            SubmitOutcome::PendingVerification => "pending_verification",
        }
    }
}

pub struct SettlementManager {
    quests: RwLock<HashMap<Uuid, Quest>>,
    actions: RwLock<HashMap<Uuid, Action>>,

    /// (quest id, proof digest) -> submitting action ids, for
    /// cross-user duplicate detection
    proof_index: RwLock<HashMap<(Uuid, String), Vec<Uuid>>>,

    issuer: Arc<RewardIssuer>,
    blacklist: Arc<BlacklistGuard>,
    risk_log: Arc<RiskEventLog>,
    oracle: Arc<dyn VerificationOracle>,
    risk_policy: RiskPolicy,
    db: Option<Arc<DatabasePool>>,
}

impl SettlementManager {
    pub fn new(
        issuer: Arc<RewardIssuer>,
        blacklist: Arc<BlacklistGuard>,
        risk_log: Arc<RiskEventLog>,
        oracle: Arc<dyn VerificationOracle>,
    ) -> Self {
        Self {
            quests: RwLock::new(HashMap::new()),
            actions: RwLock::new(HashMap::new()),
            proof_index: RwLock::new(HashMap::new()),
            issuer,
            blacklist,
            risk_log,
            oracle,
            risk_policy: RiskPolicy::default(),
            db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<DatabasePool>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_risk_policy(mut self, policy: RiskPolicy) -> Self {
        self.risk_policy = policy;
        self
    }

    // Quest catalog

    pub async fn create_quest(&self, quest: Quest) -> Quest {
        {
            let mut quests = self.quests.write().await;
            quests.insert(quest.id, quest.clone());
        }
        info!(quest_id = %quest.id, quest_type = quest.quest_type.as_str(), "Quest created");

        if let Some(ref db) = self.db {
            if let Err(e) = db.quests().upsert(&quest).await {
                warn!(quest_id = %quest.id, error = %e, "Failed to persist quest");
            }
        }
        quest
    }

    pub async fn set_quest_status(&self, quest_id: Uuid, status: QuestStatus) -> Result<Quest> {
        let quest = {
            let mut quests = self.quests.write().await;
            let quest = quests
                .get_mut(&quest_id)
                .ok_or_else(|| SettlementError::NotFound(format!("quest {}", quest_id)))?;
            quest.status = status;
            quest.clone()
        };

        if let Some(ref db) = self.db {
            if let Err(e) = db.quests().upsert(&quest).await {
                warn!(quest_id = %quest.id, error = %e, "Failed to persist quest status");
            }
        }
        Ok(quest)
    }

    pub async fn get_quest(&self, quest_id: Uuid) -> Option<Quest> {
        let quests = self.quests.read().await;
        quests.get(&quest_id).cloned()
    }

    pub async fn list_quests(&self) -> Vec<Quest> {
        let quests = self.quests.read().await;
        let mut list: Vec<_> = quests.values().cloned().collect();
        list.sort_by_key(|q| q.created_at);
        list
    }

    // Lifecycle

    /// Start an attempt. Upsert on (user, quest): an unresolved attempt
    /// is returned as-is instead of duplicated.
    pub async fn claim(
        &self,
        user_id: &str,
        quest_id: Uuid,
        identifiers: &Identifiers,
    ) -> Result<Action> {
        if self.blacklist.is_blocked(identifiers).await {
            return Err(SettlementError::Blocked(format!(
                "claim denied for user {}",
                user_id
            )));
        }

        let quest = self
            .get_quest(quest_id)
            .await
            .ok_or_else(|| SettlementError::NotFound(format!("quest {}", quest_id)))?;
        if quest.status != QuestStatus::Active {
            return Err(SettlementError::QuestNotOpen(format!(
                "quest {} is {}",
                quest_id,
                quest.status.as_str()
            )));
        }

        let action = {
            let mut actions = self.actions.write().await;

            if let Some(existing) = actions
                .values()
                .find(|a| a.user_id == user_id && a.quest_id == quest_id && !a.status.is_terminal())
            {
                return Ok(existing.clone());
            }

            let rewarded_by_user = actions
                .values()
                .filter(|a| {
                    a.user_id == user_id
                        && a.quest_id == quest_id
                        && a.status == ActionStatus::Rewarded
                })
                .count();
            if quest.per_user_cap > 0 && rewarded_by_user >= quest.per_user_cap as usize {
                return Err(SettlementError::LimitExceeded(format!(
                    "per-user cap of {} reached for quest {}",
                    quest.per_user_cap, quest_id
                )));
            }

            let today = Utc::now().date_naive();
            let rewarded_today = actions
                .values()
                .filter(|a| {
                    a.quest_id == quest_id
                        && a.status == ActionStatus::Rewarded
                        && a.verified_at.map(|t| t.date_naive() == today).unwrap_or(false)
                })
                .count();
            if quest.daily_cap > 0 && rewarded_today >= quest.daily_cap as usize {
                return Err(SettlementError::LimitExceeded(format!(
                    "daily cap of {} reached for quest {}",
                    quest.daily_cap, quest_id
                )));
            }

            let action = Action::claim(user_id, quest_id);
            actions.insert(action.id, action.clone());
            action
        };

        info!(action_id = %action.id, user_id = %user_id, quest_id = %quest_id, "Action claimed");

        self.risk_log
            .append(
                RiskEvent::new(RiskEventKind::ActionClaimed, RiskSeverity::Low, Some(user_id))
                    .with_details(serde_json::json!({
                        "quest_id": quest_id,
                        "action_id": action.id,
                    }))
                    .with_source(identifiers.ip.as_deref(), identifiers.device.as_deref()),
            )
            .await;

        let window_start =
            Utc::now() - Duration::minutes(self.risk_policy.velocity_window_minutes);
        let claims = self
            .risk_log
            .count_for_user_since(user_id, RiskEventKind::ActionClaimed, window_start)
            .await;
        if claims == self.risk_policy.velocity_max_claims + 1 {
            warn!(user_id = %user_id, claims, "Claim velocity anomaly");
            self.risk_log
                .append(
                    RiskEvent::new(
                        RiskEventKind::VelocityAnomaly,
                        RiskSeverity::Medium,
                        Some(user_id),
                    )
                    .with_details(serde_json::json!({
                        "claims_in_window": claims,
                        "window_minutes": self.risk_policy.velocity_window_minutes,
                    })),
                )
                .await;
        }

        if let Some(ref db) = self.db {
            if let Err(e) = db.actions().upsert(&action).await {
                warn!(action_id = %action.id, error = %e, "Failed to persist action");
            }
        }

        Ok(action)
    }

    /// Submit proof for an attempt and route it. Valid from CLAIMED,
    /// and from SUBMITTED to retry a verification that did not confirm.
    pub async fn submit(&self, action_id: Uuid, proof: ActionProof) -> Result<SubmitOutcome> {
        let current = self
            .get_action(action_id)
            .await
            .ok_or_else(|| SettlementError::NotFound(format!("action {}", action_id)))?;
        let quest = self
            .get_quest(current.quest_id)
            .await
            .ok_or_else(|| SettlementError::NotFound(format!("quest {}", current.quest_id)))?;

        proof.validate_for(quest.quest_type)?;
        let digest = proof.digest();

        let (action, duplicate) = {
            let mut actions = self.actions.write().await;
            let mut action = actions
                .get(&action_id)
                .cloned()
                .ok_or_else(|| SettlementError::NotFound(format!("action {}", action_id)))?;

            match action.status {
                ActionStatus::Claimed | ActionStatus::Submitted => {}
                status => {
                    return Err(SettlementError::AlreadyDecided {
                        status: status.as_str().to_string(),
                    })
                }
            }

            // Same proof content from a different user on this quest
            // forces the manual path.
            let mut duplicate = false;
            {
                let mut index = self.proof_index.write().await;
                let entries = index.entry((action.quest_id, digest.clone())).or_default();
                for other_id in entries.iter() {
                    if *other_id == action_id {
                        continue;
                    }
                    if let Some(other) = actions.get(other_id) {
                        if other.user_id != action.user_id {
                            duplicate = true;
                        }
                    }
                }
                if !entries.contains(&action_id) {
                    entries.push(action_id);
                }
            }

            action.status = ActionStatus::Submitted;
            action.proof = Some(proof.clone());
            action.proof_digest = Some(digest.clone());
            action.submitted_at = Some(Utc::now());
            if duplicate {
                action.review_required = true;
            }
            actions.insert(action.id, action.clone());
            (action, duplicate)
        };

        if duplicate {
            warn!(
                action_id = %action.id,
                user_id = %action.user_id,
                "Duplicate proof across users, flagged for review"
            );
            self.risk_log
                .append(
                    RiskEvent::new(
                        RiskEventKind::DuplicateProof,
                        RiskSeverity::High,
                        Some(&action.user_id),
                    )
                    .with_details(serde_json::json!({
                        "action_id": action.id,
                        "quest_id": action.quest_id,
                        "digest": digest,
                    })),
                )
                .await;
        }

        self.risk_log
            .append(
                RiskEvent::new(
                    RiskEventKind::ProofSubmitted,
                    RiskSeverity::Low,
                    Some(&action.user_id),
                )
                .with_details(serde_json::json!({
                    "action_id": action.id,
                    "quest_id": action.quest_id,
                })),
            )
            .await;

        if let Some(ref db) = self.db {
            if let Err(e) = db.actions().upsert(&action).await {
                warn!(action_id = %action.id, error = %e, "Failed to persist submission");
            }
        }

        if ReviewGate::requires_manual_review(quest.quest_type) || action.review_required {
            info!(action_id = %action.id, "Queued for manual review");
            return Ok(SubmitOutcome::PendingReview);
        }

        match self.oracle.verify(&quest, &action).await {
            Ok(true) => {
                let reward = self.finalize_reward(action_id, "verify").await?;
                Ok(SubmitOutcome::Rewarded(reward))
            }
            Ok(false) => {
                info!(action_id = %action.id, "Oracle did not confirm, awaiting retry");
                Ok(SubmitOutcome::PendingVerification)
            }
            Err(e) => {
                warn!(action_id = %action.id, error = %e, "Oracle call failed, awaiting retry");
                Ok(SubmitOutcome::PendingVerification)
            }
        }
    }

    /// Manual approval. Only valid from SUBMITTED; a second call on the
    /// same action reports the decision already taken.
    pub async fn approve(&self, action_id: Uuid) -> Result<Reward> {
        self.finalize_reward(action_id, "approve").await
    }

    /// Manual rejection. Only valid from SUBMITTED; no balance effect.
    pub async fn reject(&self, action_id: Uuid, reason: Option<String>) -> Result<Action> {
        let action = {
            let mut actions = self.actions.write().await;
            let mut action = actions
                .get(&action_id)
                .cloned()
                .ok_or_else(|| SettlementError::NotFound(format!("action {}", action_id)))?;

            if action.status != ActionStatus::Submitted {
                return Err(SettlementError::InvalidTransition {
                    operation: "reject",
                    status: action.status.as_str().to_string(),
                });
            }

            action.status = ActionStatus::Rejected;
            action.reject_reason = reason;
            actions.insert(action.id, action.clone());
            action
        };

        info!(
            action_id = %action.id,
            reason = action.reject_reason.as_deref().unwrap_or("-"),
            "Action rejected"
        );

        if let Some(ref db) = self.db {
            if let Err(e) = db.actions().upsert(&action).await {
                warn!(action_id = %action.id, error = %e, "Failed to persist rejection");
            }
        }

        Ok(action)
    }

    /// The SUBMITTED → REWARDED transition plus reward issuance.
    ///
    /// Status and caps are re-checked under the write lock, so a
    /// concurrent decision or a cap filled since claim time fails here
    /// instead of over-rewarding.
    async fn finalize_reward(&self, action_id: Uuid, operation: &'static str) -> Result<Reward> {
        let peek = self
            .get_action(action_id)
            .await
            .ok_or_else(|| SettlementError::NotFound(format!("action {}", action_id)))?;
        let quest = self
            .get_quest(peek.quest_id)
            .await
            .ok_or_else(|| SettlementError::NotFound(format!("quest {}", peek.quest_id)))?;

        let action = {
            let mut actions = self.actions.write().await;
            let mut action = actions
                .get(&action_id)
                .cloned()
                .ok_or_else(|| SettlementError::NotFound(format!("action {}", action_id)))?;

            match action.status {
                ActionStatus::Submitted => {}
                ActionStatus::Claimed => {
                    return Err(SettlementError::InvalidTransition {
                        operation,
                        status: "claimed".to_string(),
                    })
                }
                status => {
                    return Err(SettlementError::AlreadyDecided {
                        status: status.as_str().to_string(),
                    })
                }
            }

            let rewarded_by_user = actions
                .values()
                .filter(|a| {
                    a.user_id == action.user_id
                        && a.quest_id == action.quest_id
                        && a.status == ActionStatus::Rewarded
                })
                .count();
            if quest.per_user_cap > 0 && rewarded_by_user >= quest.per_user_cap as usize {
                return Err(SettlementError::LimitExceeded(format!(
                    "per-user cap of {} reached for quest {}",
                    quest.per_user_cap, quest.id
                )));
            }

            let today = Utc::now().date_naive();
            let rewarded_today = actions
                .values()
                .filter(|a| {
                    a.quest_id == action.quest_id
                        && a.status == ActionStatus::Rewarded
                        && a.verified_at.map(|t| t.date_naive() == today).unwrap_or(false)
                })
                .count();
            if quest.daily_cap > 0 && rewarded_today >= quest.daily_cap as usize {
                return Err(SettlementError::LimitExceeded(format!(
                    "daily cap of {} reached for quest {}",
                    quest.daily_cap, quest.id
                )));
            }

            action.status = ActionStatus::Rewarded;
            action.verified_at = Some(Utc::now());
            actions.insert(action.id, action.clone());
            action
        };

        info!(action_id = %action.id, operation, "Action rewarded");
        Ok(self.issuer.issue(&action, &quest).await)
    }

    // Queries

    pub async fn get_action(&self, action_id: Uuid) -> Option<Action> {
        {
            let actions = self.actions.read().await;
            if let Some(action) = actions.get(&action_id) {
                return Some(action.clone());
            }
        }

        if let Some(ref db) = self.db {
            match db.actions().get(action_id).await {
                Ok(Some(action)) => {
                    let mut actions = self.actions.write().await;
                    return Some(actions.entry(action_id).or_insert(action).clone());
                }
                Ok(None) => {}
                Err(e) => warn!(action_id = %action_id, error = %e, "Failed to load action"),
            }
        }
        None
    }

    pub async fn actions_for_user(&self, user_id: &str) -> Vec<Action> {
        let actions = self.actions.read().await;
        let mut list: Vec<_> = actions
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by_key(|a| a.claimed_at);
        list
    }

    /// SUBMITTED actions waiting on a human: manual-review quest types
    /// plus anything flagged by duplicate detection.
    pub async fn pending_reviews(&self) -> Vec<Action> {
        let quests = self.quests.read().await;
        let actions = self.actions.read().await;

        let mut queue: Vec<_> = actions
            .values()
            .filter(|a| {
                a.status == ActionStatus::Submitted
                    && (a.review_required
                        || quests
                            .get(&a.quest_id)
                            .map(|q| ReviewGate::requires_manual_review(q.quest_type))
                            .unwrap_or(true))
            })
            .cloned()
            .collect();
        queue.sort_by_key(|a| a.submitted_at);
        queue
    }

    pub async fn action_count(&self) -> usize {
        self.actions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationSender;
    use crate::oracle::FixedVerdictOracle;
    use crate::payout::ledger::BalanceLedger;
    use crate::risk::BlacklistKind;
    use crate::settlement::models::{QuestType, RewardSpec};

    struct Fixture {
        manager: SettlementManager,
        oracle: Arc<FixedVerdictOracle>,
        ledger: Arc<BalanceLedger>,
        issuer: Arc<RewardIssuer>,
        blacklist: Arc<BlacklistGuard>,
    }

    fn fixture() -> Fixture {
        let log = Arc::new(RiskEventLog::new());
        let ledger = Arc::new(BalanceLedger::new());
        let notifier = Arc::new(NotificationSender::disabled());
        let issuer = Arc::new(RewardIssuer::new(ledger.clone(), notifier));
        let blacklist = Arc::new(BlacklistGuard::new(log.clone()));
        let oracle = Arc::new(FixedVerdictOracle::new(true));
        let manager = SettlementManager::new(
            issuer.clone(),
            blacklist.clone(),
            log,
            oracle.clone(),
        );
        Fixture {
            manager,
            oracle,
            ledger,
            issuer,
            blacklist,
        }
    }

    fn follow_quest() -> Quest {
        Quest::new(
            "Follow the channel",
            QuestType::ChannelFollow,
            RewardSpec {
                asset: "USDT".into(),
                amount: 5,
                points: 10,
            },
        )
        .with_status(QuestStatus::Active)
    }

    fn follow_proof(handle: &str) -> ActionProof {
        ActionProof {
            account_handle: Some(handle.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_claim_requires_active_quest() {
        let f = fixture();
        let quest = f
            .manager
            .create_quest(follow_quest().with_status(QuestStatus::Paused))
            .await;

        let err = f
            .manager
            .claim("user_1", quest.id, &Identifiers::user("user_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::QuestNotOpen(_)));
    }

    #[tokio::test]
    async fn test_claim_is_upsert_for_unresolved_attempt() {
        let f = fixture();
        let quest = f.manager.create_quest(follow_quest()).await;
        let ids = Identifiers::user("user_1");

        let first = f.manager.claim("user_1", quest.id, &ids).await.unwrap();
        let second = f.manager.claim("user_1", quest.id, &ids).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(f.manager.action_count().await, 1);
    }

    #[tokio::test]
    async fn test_blacklisted_user_cannot_claim() {
        let f = fixture();
        let quest = f.manager.create_quest(follow_quest()).await;
        f.blacklist
            .add(BlacklistKind::User, "user_1", Some("fraud".into()), None)
            .await;

        let err = f
            .manager
            .claim("user_1", quest.id, &Identifiers::user("user_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::Blocked(_)));
    }

    #[tokio::test]
    async fn test_auto_verified_submission_rewards() {
        let f = fixture();
        let quest = f.manager.create_quest(follow_quest()).await;
        let action = f
            .manager
            .claim("user_1", quest.id, &Identifiers::user("user_1"))
            .await
            .unwrap();

        let outcome = f
            .manager
            .submit(action.id, follow_proof("@user_1"))
            .await
            .unwrap();

        let reward = match outcome {
            SubmitOutcome::Rewarded(reward) => reward,
            other => panic!("expected reward, got {:?}", other),
        };
        assert_eq!(reward.amount, 5);
        assert_eq!(f.ledger.balance("user_1", "USDT").await.issued, 5);

        let action = f.manager.get_action(action.id).await.unwrap();
        assert_eq!(action.status, ActionStatus::Rewarded);
    }

    #[tokio::test]
    async fn test_oracle_denial_leaves_action_submitted() {
        let f = fixture();
        f.oracle.set(false);
        let quest = f.manager.create_quest(follow_quest()).await;
        let action = f
            .manager
            .claim("user_1", quest.id, &Identifiers::user("user_1"))
            .await
            .unwrap();

        let outcome = f
            .manager
            .submit(action.id, follow_proof("@user_1"))
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::PendingVerification));

        let action = f.manager.get_action(action.id).await.unwrap();
        assert_eq!(action.status, ActionStatus::Submitted);

        // Retry after the oracle can confirm.
        f.oracle.set(true);
        let outcome = f
            .manager
            .submit(action.id, follow_proof("@user_1"))
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Rewarded(_)));
    }

    #[tokio::test]
    async fn test_screenshot_quest_queues_for_review() {
        let f = fixture();
        let quest = f
            .manager
            .create_quest(
                Quest::new(
                    "Share a screenshot",
                    QuestType::ScreenshotUpload,
                    RewardSpec {
                        asset: "PTS".into(),
                        amount: 100,
                        points: 0,
                    },
                )
                .with_status(QuestStatus::Active),
            )
            .await;
        let action = f
            .manager
            .claim("user_1", quest.id, &Identifiers::user("user_1"))
            .await
            .unwrap();

        let proof = ActionProof {
            artifact_url: Some("https://cdn.example/shot.png".into()),
            ..Default::default()
        };
        let outcome = f.manager.submit(action.id, proof).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::PendingReview));
        assert_eq!(f.manager.pending_reviews().await.len(), 1);
    }

    #[tokio::test]
    async fn test_approve_is_idempotent() {
        let f = fixture();
        f.oracle.set(false);
        let quest = f.manager.create_quest(follow_quest()).await;
        let action = f
            .manager
            .claim("user_1", quest.id, &Identifiers::user("user_1"))
            .await
            .unwrap();
        f.manager
            .submit(action.id, follow_proof("@user_1"))
            .await
            .unwrap();

        let reward = f.manager.approve(action.id).await.unwrap();

        let err = f.manager.approve(action.id).await.unwrap_err();
        assert!(matches!(err, SettlementError::AlreadyDecided { .. }));

        // Exactly one reward exists.
        assert_eq!(f.issuer.total().await, 1);
        assert_eq!(
            f.issuer.reward_for_action(action.id).await.unwrap().id,
            reward.id
        );
    }

    #[tokio::test]
    async fn test_reject_only_from_submitted() {
        let f = fixture();
        let quest = f.manager.create_quest(follow_quest()).await;
        let action = f
            .manager
            .claim("user_1", quest.id, &Identifiers::user("user_1"))
            .await
            .unwrap();

        // Claimed, not submitted yet.
        let err = f
            .manager
            .reject(action.id, Some("nope".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidTransition { .. }));

        f.oracle.set(false);
        f.manager
            .submit(action.id, follow_proof("@user_1"))
            .await
            .unwrap();
        let rejected = f
            .manager
            .reject(action.id, Some("fake proof".into()))
            .await
            .unwrap();
        assert_eq!(rejected.status, ActionStatus::Rejected);
        assert_eq!(rejected.reject_reason.as_deref(), Some("fake proof"));

        // Terminal now.
        let err = f.manager.reject(action.id, None).await.unwrap_err();
        assert!(matches!(err, SettlementError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_per_user_cap_blocks_second_claim() {
        let f = fixture();
        let quest = f
            .manager
            .create_quest(follow_quest().with_caps(1, 1))
            .await;
        let ids = Identifiers::user("user_1");

        let action = f.manager.claim("user_1", quest.id, &ids).await.unwrap();
        f.manager
            .submit(action.id, follow_proof("@user_1"))
            .await
            .unwrap();

        let err = f.manager.claim("user_1", quest.id, &ids).await.unwrap_err();
        assert!(matches!(err, SettlementError::LimitExceeded(_)));
    }

    #[tokio::test]
    async fn test_daily_cap_blocks_other_users() {
        let f = fixture();
        let quest = f
            .manager
            .create_quest(follow_quest().with_caps(1, 1))
            .await;

        let action = f
            .manager
            .claim("user_1", quest.id, &Identifiers::user("user_1"))
            .await
            .unwrap();
        f.manager
            .submit(action.id, follow_proof("@user_1"))
            .await
            .unwrap();

        let err = f
            .manager
            .claim("user_2", quest.id, &Identifiers::user("user_2"))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::LimitExceeded(_)));
    }

    #[tokio::test]
    async fn test_duplicate_proof_across_users_forces_review() {
        let f = fixture();
        let quest = f
            .manager
            .create_quest(follow_quest().with_caps(0, 0))
            .await;

        let first = f
            .manager
            .claim("user_1", quest.id, &Identifiers::user("user_1"))
            .await
            .unwrap();
        f.manager
            .submit(first.id, follow_proof("@same_handle"))
            .await
            .unwrap();

        let second = f
            .manager
            .claim("user_2", quest.id, &Identifiers::user("user_2"))
            .await
            .unwrap();
        let outcome = f
            .manager
            .submit(second.id, follow_proof("@same_handle"))
            .await
            .unwrap();

        // Identical proof from a different user: no auto-reward.
        assert!(matches!(outcome, SubmitOutcome::PendingReview));
        let action = f.manager.get_action(second.id).await.unwrap();
        assert!(action.review_required);
    }

    #[tokio::test]
    async fn test_invalid_proof_is_rejected_at_the_boundary() {
        let f = fixture();
        let quest = f.manager.create_quest(follow_quest()).await;
        let action = f
            .manager
            .claim("user_1", quest.id, &Identifiers::user("user_1"))
            .await
            .unwrap();

        let err = f
            .manager
            .submit(action.id, ActionProof::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidProof(_)));

        // No state change.
        let action = f.manager.get_action(action.id).await.unwrap();
        assert_eq!(action.status, ActionStatus::Claimed);
    }
}
