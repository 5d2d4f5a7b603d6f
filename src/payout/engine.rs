//! Payout State Machine
//!
//! PENDING → {PROCESSING | FAILED}; PROCESSING → COMPLETED. The request
//! earmarks the amount in the ledger, so concurrent requests cannot
//! spend the same funds; rejection releases the hold, completion
//! settles it. Every transition re-reads the status under the write
//! lock, so a second concurrent decision fails instead of
//! double-applying.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::DatabasePool;
use crate::error::{Result, SettlementError};
use crate::notify::NotificationSender;
use crate::payout::ledger::BalanceLedger;
use crate::payout::models::{Payout, PayoutStatus};
use crate::risk::{
    BlacklistGuard, Identifiers, RiskEvent, RiskEventKind, RiskEventLog, RiskLevel, RiskScorer,
    RiskSeverity,
};

#[derive(Debug, Clone)]
pub struct PayoutPolicy {
    /// Smallest amount a user may withdraw
    pub min_amount: i64,
}

impl Default for PayoutPolicy {
    fn default() -> Self {
        Self { min_amount: 1 }
    }
}

pub struct PayoutManager {
    payouts: RwLock<HashMap<Uuid, Payout>>,
    ledger: Arc<BalanceLedger>,
    blacklist: Arc<BlacklistGuard>,
    scorer: Arc<RiskScorer>,
    risk_log: Arc<RiskEventLog>,
    notifier: Arc<NotificationSender>,
    policy: PayoutPolicy,
    db: Option<Arc<DatabasePool>>,
}

impl PayoutManager {
    pub fn new(
        ledger: Arc<BalanceLedger>,
        blacklist: Arc<BlacklistGuard>,
        scorer: Arc<RiskScorer>,
        risk_log: Arc<RiskEventLog>,
        notifier: Arc<NotificationSender>,
    ) -> Self {
        Self {
            payouts: RwLock::new(HashMap::new()),
            ledger,
            blacklist,
            scorer,
            risk_log,
            notifier,
            policy: PayoutPolicy::default(),
            db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<DatabasePool>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_policy(mut self, policy: PayoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Create a withdrawal request and earmark its amount.
    pub async fn request(
        &self,
        user_id: &str,
        asset: &str,
        amount: i64,
        to_address: &str,
        identifiers: &Identifiers,
    ) -> Result<Payout> {
        if amount < self.policy.min_amount {
            return Err(SettlementError::LimitExceeded(format!(
                "amount {} is below the minimum of {}",
                amount, self.policy.min_amount
            )));
        }

        // The destination address is itself an identifier the deny-list
        // can carry (under the user kind).
        if self.blacklist.is_blocked(identifiers).await
            || self.blacklist.is_blocked(&Identifiers::user(to_address)).await
        {
            return Err(SettlementError::Blocked(format!(
                "payout denied for user {}",
                user_id
            )));
        }

        self.ledger.try_earmark(user_id, asset, amount).await?;

        let assessment = self.scorer.score(user_id).await;
        let payout = Payout::request(user_id, asset, amount, to_address, assessment.level);

        {
            let mut payouts = self.payouts.write().await;
            payouts.insert(payout.id, payout.clone());
        }

        info!(
            payout_id = %payout.id,
            user_id = %user_id,
            asset = %asset,
            amount,
            risk_level = assessment.level.as_str(),
            "Payout requested"
        );

        let severity = match assessment.level {
            RiskLevel::High => RiskSeverity::High,
            RiskLevel::Medium => RiskSeverity::Medium,
            RiskLevel::Low => RiskSeverity::Low,
        };
        self.risk_log
            .append(
                RiskEvent::new(RiskEventKind::PayoutRequested, severity, Some(user_id))
                    .with_details(serde_json::json!({
                        "payout_id": payout.id,
                        "asset": asset,
                        "amount": amount,
                        "to_address": to_address,
                        "risk_factors": assessment.factors,
                    }))
                    .with_source(identifiers.ip.as_deref(), identifiers.device.as_deref()),
            )
            .await;

        if let Some(ref db) = self.db {
            if let Err(e) = db.payouts().insert(&payout).await {
                warn!(payout_id = %payout.id, error = %e, "Failed to persist payout");
            }
        }

        Ok(payout)
    }

    /// Approve a pending payout. With a tx hash the transfer already
    /// happened out-of-band and the payout completes immediately;
    /// without one it moves to PROCESSING for later completion.
    pub async fn approve(&self, payout_id: Uuid, tx_hash: Option<String>) -> Result<Payout> {
        let payout = {
            let mut payouts = self.payouts.write().await;
            let mut payout = payouts
                .get(&payout_id)
                .cloned()
                .ok_or_else(|| SettlementError::NotFound(format!("payout {}", payout_id)))?;

            if payout.status != PayoutStatus::Pending {
                return Err(SettlementError::InvalidTransition {
                    operation: "approve",
                    status: payout.status.as_str().to_string(),
                });
            }

            match tx_hash {
                Some(tx) => {
                    payout.status = PayoutStatus::Completed;
                    payout.tx_hash = Some(tx);
                    payout.processed_at = Some(Utc::now());
                }
                None => {
                    payout.status = PayoutStatus::Processing;
                }
            }
            payouts.insert(payout.id, payout.clone());
            payout
        };

        if payout.status == PayoutStatus::Completed {
            self.ledger
                .settle(&payout.beneficiary_id, &payout.asset, payout.amount)
                .await;
        }

        info!(
            payout_id = %payout.id,
            status = payout.status.as_str(),
            "Payout approved"
        );

        self.persist(&payout).await;
        self.notifier.notify(
            &payout.beneficiary_id,
            &format!(
                "Withdrawal of {} {} {}",
                payout.amount,
                payout.asset,
                match payout.status {
                    PayoutStatus::Completed => "completed",
                    _ => "approved, transfer in progress",
                }
            ),
        );

        Ok(payout)
    }

    /// Reject a pending payout and release the earmarked balance.
    pub async fn reject(&self, payout_id: Uuid, reason: Option<String>) -> Result<Payout> {
        let payout = {
            let mut payouts = self.payouts.write().await;
            let mut payout = payouts
                .get(&payout_id)
                .cloned()
                .ok_or_else(|| SettlementError::NotFound(format!("payout {}", payout_id)))?;

            if payout.status != PayoutStatus::Pending {
                return Err(SettlementError::InvalidTransition {
                    operation: "reject",
                    status: payout.status.as_str().to_string(),
                });
            }

            payout.status = PayoutStatus::Failed;
            payout.reason = reason;
            payout.processed_at = Some(Utc::now());
            payouts.insert(payout.id, payout.clone());
            payout
        };

        self.ledger
            .release(&payout.beneficiary_id, &payout.asset, payout.amount)
            .await;

        info!(
            payout_id = %payout.id,
            reason = payout.reason.as_deref().unwrap_or("-"),
            "Payout rejected"
        );

        self.persist(&payout).await;
        self.notifier.notify(
            &payout.beneficiary_id,
            &format!(
                "Withdrawal of {} {} was rejected",
                payout.amount, payout.asset
            ),
        );

        Ok(payout)
    }

    /// Complete a payout, supplying the transfer evidence. Valid from
    /// PROCESSING, and from PENDING when an operator settles directly.
    pub async fn complete(
        &self,
        payout_id: Uuid,
        tx_hash: Option<String>,
        proof: Option<String>,
    ) -> Result<Payout> {
        if tx_hash.is_none() && proof.is_none() {
            return Err(SettlementError::InsufficientEvidence);
        }

        let payout = {
            let mut payouts = self.payouts.write().await;
            let mut payout = payouts
                .get(&payout_id)
                .cloned()
                .ok_or_else(|| SettlementError::NotFound(format!("payout {}", payout_id)))?;

            match payout.status {
                PayoutStatus::Pending | PayoutStatus::Processing => {}
                status => {
                    return Err(SettlementError::InvalidTransition {
                        operation: "complete",
                        status: status.as_str().to_string(),
                    })
                }
            }

            payout.status = PayoutStatus::Completed;
            payout.tx_hash = tx_hash;
            payout.proof_of_transfer = proof;
            payout.processed_at = Some(Utc::now());
            payouts.insert(payout.id, payout.clone());
            payout
        };

        self.ledger
            .settle(&payout.beneficiary_id, &payout.asset, payout.amount)
            .await;

        info!(payout_id = %payout.id, "Payout completed");

        self.persist(&payout).await;
        self.notifier.notify(
            &payout.beneficiary_id,
            &format!(
                "Withdrawal of {} {} completed",
                payout.amount, payout.asset
            ),
        );

        Ok(payout)
    }

    // Queries

    pub async fn get_payout(&self, payout_id: Uuid) -> Option<Payout> {
        {
            let payouts = self.payouts.read().await;
            if let Some(payout) = payouts.get(&payout_id) {
                return Some(payout.clone());
            }
        }

        if let Some(ref db) = self.db {
            match db.payouts().get(payout_id).await {
                Ok(Some(payout)) => {
                    let mut payouts = self.payouts.write().await;
                    return Some(payouts.entry(payout_id).or_insert(payout).clone());
                }
                Ok(None) => {}
                Err(e) => warn!(payout_id = %payout_id, error = %e, "Failed to load payout"),
            }
        }
        None
    }

    pub async fn payouts_for_user(&self, user_id: &str) -> Vec<Payout> {
        let payouts = self.payouts.read().await;
        let mut list: Vec<_> = payouts
            .values()
            .filter(|p| p.beneficiary_id == user_id)
            .cloned()
            .collect();
        list.sort_by_key(|p| p.created_at);
        list
    }

    /// PENDING payouts awaiting an admin decision
    pub async fn pending(&self) -> Vec<Payout> {
        let payouts = self.payouts.read().await;
        let mut list: Vec<_> = payouts
            .values()
            .filter(|p| p.status == PayoutStatus::Pending)
            .cloned()
            .collect();
        list.sort_by_key(|p| p.created_at);
        list
    }

    pub fn ledger(&self) -> &Arc<BalanceLedger> {
        &self.ledger
    }

    async fn persist(&self, payout: &Payout) {
        if let Some(ref db) = self.db {
            if let Err(e) = db.payouts().upsert(payout).await {
                warn!(payout_id = %payout.id, error = %e, "Failed to persist payout");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::{BlacklistKind, RiskPolicy};

    struct Fixture {
        manager: PayoutManager,
        ledger: Arc<BalanceLedger>,
        blacklist: Arc<BlacklistGuard>,
    }

    fn fixture() -> Fixture {
        let log = Arc::new(RiskEventLog::new());
        let ledger = Arc::new(BalanceLedger::new());
        let blacklist = Arc::new(BlacklistGuard::new(log.clone()));
        let scorer = Arc::new(RiskScorer::new(log.clone(), RiskPolicy::default()));
        let manager = PayoutManager::new(
            ledger.clone(),
            blacklist.clone(),
            scorer,
            log,
            Arc::new(NotificationSender::disabled()),
        )
        .with_policy(PayoutPolicy { min_amount: 10 });
        Fixture {
            manager,
            ledger,
            blacklist,
        }
    }

    #[tokio::test]
    async fn test_request_beyond_balance_fails_without_a_row() {
        let f = fixture();
        f.ledger.credit("user_1", "USDT", 30).await;

        let err = f
            .manager
            .request("user_1", "USDT", 50, "0xdead", &Identifiers::user("user_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::LimitExceeded(_)));
        assert!(f.manager.payouts_for_user("user_1").await.is_empty());
    }

    #[tokio::test]
    async fn test_request_below_minimum_fails() {
        let f = fixture();
        f.ledger.credit("user_1", "USDT", 100).await;

        let err = f
            .manager
            .request("user_1", "USDT", 5, "0xdead", &Identifiers::user("user_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::LimitExceeded(_)));
    }

    #[tokio::test]
    async fn test_blacklisted_destination_is_blocked() {
        let f = fixture();
        f.ledger.credit("user_1", "USDT", 100).await;
        f.blacklist
            .add(BlacklistKind::User, "0xdead", Some("sanctioned".into()), None)
            .await;

        let err = f
            .manager
            .request("user_1", "USDT", 50, "0xdead", &Identifiers::user("user_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::Blocked(_)));
    }

    #[tokio::test]
    async fn test_concurrent_requests_cannot_double_spend() {
        let f = fixture();
        f.ledger.credit("user_1", "USDT", 100).await;
        let ids = Identifiers::user("user_1");

        f.manager
            .request("user_1", "USDT", 80, "0xaaa", &ids)
            .await
            .unwrap();
        let err = f
            .manager
            .request("user_1", "USDT", 80, "0xbbb", &ids)
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::LimitExceeded(_)));
    }

    #[tokio::test]
    async fn test_approve_with_tx_completes_immediately() {
        let f = fixture();
        f.ledger.credit("user_1", "USDT", 100).await;
        let payout = f
            .manager
            .request("user_1", "USDT", 50, "0xaaa", &Identifiers::user("user_1"))
            .await
            .unwrap();

        let approved = f
            .manager
            .approve(payout.id, Some("0xtx".into()))
            .await
            .unwrap();
        assert_eq!(approved.status, PayoutStatus::Completed);
        assert_eq!(approved.tx_hash.as_deref(), Some("0xtx"));

        let balance = f.ledger.balance("user_1", "USDT").await;
        assert_eq!(balance.withdrawn, 50);
        assert_eq!(balance.earmarked, 0);
    }

    #[tokio::test]
    async fn test_approve_then_complete_path() {
        let f = fixture();
        f.ledger.credit("user_1", "USDT", 100).await;
        let payout = f
            .manager
            .request("user_1", "USDT", 50, "0xaaa", &Identifiers::user("user_1"))
            .await
            .unwrap();

        let processing = f.manager.approve(payout.id, None).await.unwrap();
        assert_eq!(processing.status, PayoutStatus::Processing);

        let completed = f
            .manager
            .complete(payout.id, Some("0xtx".into()), None)
            .await
            .unwrap();
        assert_eq!(completed.status, PayoutStatus::Completed);

        // Second completion is a clean failure.
        let err = f
            .manager
            .complete(payout.id, Some("0xtx".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_complete_requires_evidence() {
        let f = fixture();
        f.ledger.credit("user_1", "USDT", 100).await;
        let payout = f
            .manager
            .request("user_1", "USDT", 50, "0xaaa", &Identifiers::user("user_1"))
            .await
            .unwrap();

        let err = f.manager.complete(payout.id, None, None).await.unwrap_err();
        assert!(matches!(err, SettlementError::InsufficientEvidence));

        // No state change.
        let payout = f.manager.get_payout(payout.id).await.unwrap();
        assert_eq!(payout.status, PayoutStatus::Pending);
    }

    #[tokio::test]
    async fn test_reject_releases_the_hold() {
        let f = fixture();
        f.ledger.credit("user_1", "USDT", 100).await;
        let payout = f
            .manager
            .request("user_1", "USDT", 100, "0xaaa", &Identifiers::user("user_1"))
            .await
            .unwrap();
        assert_eq!(f.ledger.balance("user_1", "USDT").await.available(), 0);

        let rejected = f
            .manager
            .reject(payout.id, Some("address mismatch".into()))
            .await
            .unwrap();
        assert_eq!(rejected.status, PayoutStatus::Failed);
        assert_eq!(f.ledger.balance("user_1", "USDT").await.available(), 100);

        // Terminal: a second decision fails with no state change.
        let err = f.manager.reject(payout.id, None).await.unwrap_err();
        assert!(matches!(err, SettlementError::InvalidTransition { .. }));
        let err = f.manager.approve(payout.id, None).await.unwrap_err();
        assert!(matches!(err, SettlementError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_complete_directly_from_pending() {
        let f = fixture();
        f.ledger.credit("user_1", "USDT", 100).await;
        let payout = f
            .manager
            .request("user_1", "USDT", 40, "0xaaa", &Identifiers::user("user_1"))
            .await
            .unwrap();

        let completed = f
            .manager
            .complete(payout.id, None, Some("bank receipt #42".into()))
            .await
            .unwrap();
        assert_eq!(completed.status, PayoutStatus::Completed);
        assert_eq!(
            completed.proof_of_transfer.as_deref(),
            Some("bank receipt #42")
        );
    }
}
