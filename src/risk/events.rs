//! Risk Event Log
//!
//! Append-only record of trust-relevant activity. Events are never
//! mutated or deleted; the scorer derives a rolling score from them and
//! the blacklist guard emits them on every list change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::database::DatabasePool;

/// Qualitative severity of a risk event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskSeverity {
    /// Contribution of one event of this severity to the risk score
    pub fn weight(&self) -> i32 {
        match self {
            RiskSeverity::Low => 5,
            RiskSeverity::Medium => 15,
            RiskSeverity::High => 30,
            RiskSeverity::Critical => 60,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskSeverity::Low => "low",
            RiskSeverity::Medium => "medium",
            RiskSeverity::High => "high",
            RiskSeverity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(RiskSeverity::Low),
            "medium" => Some(RiskSeverity::Medium),
            "high" => Some(RiskSeverity::High),
            "critical" => Some(RiskSeverity::Critical),
            _ => None,
        }
    }
}

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskEventKind {
    ActionClaimed,
    ProofSubmitted,
    DuplicateProof,
    BlacklistAdded,
    BlacklistRemoved,
    PayoutRequested,
    VelocityAnomaly,
    ManualFlag,
}

impl RiskEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskEventKind::ActionClaimed => "action_claimed",
            RiskEventKind::ProofSubmitted => "proof_submitted",
            RiskEventKind::DuplicateProof => "duplicate_proof",
            RiskEventKind::BlacklistAdded => "blacklist_added",
            RiskEventKind::BlacklistRemoved => "blacklist_removed",
            RiskEventKind::PayoutRequested => "payout_requested",
            RiskEventKind::VelocityAnomaly => "velocity_anomaly",
            RiskEventKind::ManualFlag => "manual_flag",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "action_claimed" => Some(RiskEventKind::ActionClaimed),
            "proof_submitted" => Some(RiskEventKind::ProofSubmitted),
            "duplicate_proof" => Some(RiskEventKind::DuplicateProof),
            "blacklist_added" => Some(RiskEventKind::BlacklistAdded),
            "blacklist_removed" => Some(RiskEventKind::BlacklistRemoved),
            "payout_requested" => Some(RiskEventKind::PayoutRequested),
            "velocity_anomaly" => Some(RiskEventKind::VelocityAnomaly),
            "manual_flag" => Some(RiskEventKind::ManualFlag),
            _ => None,
        }
    }
}

/// One entry in the append-only log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEvent {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub kind: RiskEventKind,
    pub severity: RiskSeverity,

    /// Structured context (quest id, payout amount, matched value, ...)
    pub details: serde_json::Value,

    pub ip: Option<String>,
    pub device: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RiskEvent {
    pub fn new(kind: RiskEventKind, severity: RiskSeverity, user_id: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.map(|u| u.to_string()),
            kind,
            severity,
            details: serde_json::Value::Null,
            ip: None,
            device: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_source(mut self, ip: Option<&str>, device: Option<&str>) -> Self {
        self.ip = ip.map(|s| s.to_string());
        self.device = device.map(|s| s.to_string());
        self
    }
}

/// Shared append-only event log
///
/// In-memory authoritative; mirrored to the `risk_events` table when a
/// database is attached.
pub struct RiskEventLog {
    events: RwLock<Vec<RiskEvent>>,
    db: Option<Arc<DatabasePool>>,
}

impl RiskEventLog {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<DatabasePool>) -> Self {
        self.db = Some(db);
        self
    }

    pub async fn append(&self, event: RiskEvent) -> RiskEvent {
        {
            let mut events = self.events.write().await;
            events.push(event.clone());
        }

        if let Some(ref db) = self.db {
            if let Err(e) = db.risk_events().insert(&event).await {
                warn!(event_id = %event.id, error = %e, "Failed to persist risk event");
            }
        }

        event
    }

    /// All events recorded for one user, oldest first
    pub async fn for_user(&self, user_id: &str) -> Vec<RiskEvent> {
        let events = self.events.read().await;
        events
            .iter()
            .filter(|e| e.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect()
    }

    /// Count a user's events of one kind at or after `since`
    pub async fn count_for_user_since(
        &self,
        user_id: &str,
        kind: RiskEventKind,
        since: DateTime<Utc>,
    ) -> usize {
        let events = self.events.read().await;
        events
            .iter()
            .filter(|e| {
                e.user_id.as_deref() == Some(user_id) && e.kind == kind && e.created_at >= since
            })
            .count()
    }

    pub async fn total(&self) -> usize {
        self.events.read().await.len()
    }
}

impl Default for RiskEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_weights_are_ordered() {
        assert!(RiskSeverity::Low.weight() < RiskSeverity::Medium.weight());
        assert!(RiskSeverity::Medium.weight() < RiskSeverity::High.weight());
        assert!(RiskSeverity::High.weight() < RiskSeverity::Critical.weight());
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            RiskEventKind::ActionClaimed,
            RiskEventKind::DuplicateProof,
            RiskEventKind::PayoutRequested,
        ] {
            assert_eq!(RiskEventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RiskEventKind::parse("unknown"), None);
    }

    #[tokio::test]
    async fn test_append_and_filter() {
        let log = RiskEventLog::new();

        log.append(RiskEvent::new(
            RiskEventKind::ActionClaimed,
            RiskSeverity::Low,
            Some("user_1"),
        ))
        .await;
        log.append(RiskEvent::new(
            RiskEventKind::ActionClaimed,
            RiskSeverity::Low,
            Some("user_2"),
        ))
        .await;

        assert_eq!(log.total().await, 2);
        assert_eq!(log.for_user("user_1").await.len(), 1);

        let since = Utc::now() - chrono::Duration::minutes(5);
        assert_eq!(
            log.count_for_user_since("user_1", RiskEventKind::ActionClaimed, since)
                .await,
            1
        );
    }
}
