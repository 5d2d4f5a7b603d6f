//! Blacklist Guard
//!
//! Hard deny-list over user, device, and IP identifiers. A match on any
//! non-expired record blocks the operation. Records are kept after
//! expiry for audit; expiry is derived at check time, never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::DatabasePool;
use crate::error::{Result, SettlementError};
use crate::risk::events::{RiskEvent, RiskEventKind, RiskEventLog, RiskSeverity};

/// What a blacklist record matches against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlacklistKind {
    User,
    Device,
    Ip,
}

impl BlacklistKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlacklistKind::User => "user",
            BlacklistKind::Device => "device",
            BlacklistKind::Ip => "ip",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(BlacklistKind::User),
            "device" => Some(BlacklistKind::Device),
            "ip" => Some(BlacklistKind::Ip),
            _ => None,
        }
    }
}

/// One deny-list record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub id: Uuid,
    pub kind: BlacklistKind,
    pub value: String,
    pub reason: Option<String>,
    /// None means permanent
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlacklistEntry {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// The identifiers one request carries
#[derive(Debug, Clone, Default)]
pub struct Identifiers {
    pub user: Option<String>,
    pub device: Option<String>,
    pub ip: Option<String>,
}

impl Identifiers {
    pub fn user(user_id: &str) -> Self {
        Self {
            user: Some(user_id.to_string()),
            ..Default::default()
        }
    }

    pub fn with_device(mut self, device: Option<&str>) -> Self {
        self.device = device.map(|s| s.to_string());
        self
    }

    pub fn with_ip(mut self, ip: Option<&str>) -> Self {
        self.ip = ip.map(|s| s.to_string());
        self
    }
}

/// Deny-list keyed by (kind, value); adding the same pair twice updates
/// the existing record in place.
pub struct BlacklistGuard {
    entries: RwLock<HashMap<(BlacklistKind, String), BlacklistEntry>>,
    log: Arc<RiskEventLog>,
    db: Option<Arc<DatabasePool>>,
}

impl BlacklistGuard {
    pub fn new(log: Arc<RiskEventLog>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            log,
            db: None,
        }
    }

    pub fn with_database(mut self, db: Arc<DatabasePool>) -> Self {
        self.db = Some(db);
        self
    }

    /// Add or refresh a record. Idempotent on (kind, value): the second
    /// add updates reason and expiry, keeping the original id.
    pub async fn add(
        &self,
        kind: BlacklistKind,
        value: &str,
        reason: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> BlacklistEntry {
        let now = Utc::now();
        let entry = {
            let mut entries = self.entries.write().await;
            let key = (kind, value.to_string());
            let entry = entries
                .entry(key)
                .and_modify(|e| {
                    e.reason = reason.clone();
                    e.expires_at = expires_at;
                    e.updated_at = now;
                })
                .or_insert_with(|| BlacklistEntry {
                    id: Uuid::new_v4(),
                    kind,
                    value: value.to_string(),
                    reason: reason.clone(),
                    expires_at,
                    created_at: now,
                    updated_at: now,
                });
            entry.clone()
        };

        info!(kind = kind.as_str(), value = %value, "Blacklist entry added");

        let user_id = match kind {
            BlacklistKind::User => Some(value),
            _ => None,
        };
        self.log
            .append(
                RiskEvent::new(RiskEventKind::BlacklistAdded, RiskSeverity::High, user_id)
                    .with_details(serde_json::json!({
                        "kind": kind.as_str(),
                        "value": value,
                        "reason": entry.reason,
                    })),
            )
            .await;

        if let Some(ref db) = self.db {
            if let Err(e) = db.blacklist().upsert(&entry).await {
                warn!(entry_id = %entry.id, error = %e, "Failed to persist blacklist entry");
            }
        }

        entry
    }

    /// Remove a record by id. Fails with NotFound for an unknown id.
    pub async fn remove(&self, id: Uuid) -> Result<BlacklistEntry> {
        let removed = {
            let mut entries = self.entries.write().await;
            let key = entries
                .iter()
                .find(|(_, e)| e.id == id)
                .map(|(k, _)| k.clone());
            match key {
                Some(key) => entries.remove(&key),
                None => None,
            }
        };

        let entry = removed.ok_or_else(|| {
            SettlementError::NotFound(format!("blacklist entry {}", id))
        })?;

        info!(kind = entry.kind.as_str(), value = %entry.value, "Blacklist entry removed");

        let user_id = match entry.kind {
            BlacklistKind::User => Some(entry.value.as_str()),
            _ => None,
        };
        self.log
            .append(
                RiskEvent::new(
                    RiskEventKind::BlacklistRemoved,
                    RiskSeverity::Medium,
                    user_id,
                )
                .with_details(serde_json::json!({
                    "kind": entry.kind.as_str(),
                    "value": entry.value,
                })),
            )
            .await;

        if let Some(ref db) = self.db {
            if let Err(e) = db.blacklist().delete(entry.id).await {
                warn!(entry_id = %entry.id, error = %e, "Failed to delete persisted blacklist entry");
            }
        }

        Ok(entry)
    }

    /// True if any identifier matches a non-expired record of its kind
    pub async fn is_blocked(&self, ids: &Identifiers) -> bool {
        let now = Utc::now();
        let entries = self.entries.read().await;

        let check = |kind: BlacklistKind, value: &Option<String>| -> bool {
            value
                .as_ref()
                .and_then(|v| entries.get(&(kind, v.clone())))
                .map(|e| !e.is_expired_at(now))
                .unwrap_or(false)
        };

        check(BlacklistKind::User, &ids.user)
            || check(BlacklistKind::Device, &ids.device)
            || check(BlacklistKind::Ip, &ids.ip)
    }

    pub async fn get(&self, id: Uuid) -> Option<BlacklistEntry> {
        let entries = self.entries.read().await;
        entries.values().find(|e| e.id == id).cloned()
    }

    /// Every record, expired ones included (audit view)
    pub async fn list(&self) -> Vec<BlacklistEntry> {
        let entries = self.entries.read().await;
        let mut all: Vec<_> = entries.values().cloned().collect();
        all.sort_by_key(|e| e.created_at);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> BlacklistGuard {
        BlacklistGuard::new(Arc::new(RiskEventLog::new()))
    }

    #[tokio::test]
    async fn test_blocks_on_any_identifier() {
        let guard = guard();
        guard
            .add(BlacklistKind::Ip, "10.0.0.1", None, None)
            .await;

        let ids = Identifiers::user("clean_user").with_ip(Some("10.0.0.1"));
        assert!(guard.is_blocked(&ids).await);

        let clean = Identifiers::user("clean_user").with_ip(Some("10.0.0.2"));
        assert!(!guard.is_blocked(&clean).await);
    }

    #[tokio::test]
    async fn test_add_is_idempotent_and_updates_in_place() {
        let guard = guard();

        let first = guard
            .add(BlacklistKind::User, "user_1", Some("fraud".into()), None)
            .await;
        let second = guard
            .add(
                BlacklistKind::User,
                "user_1",
                Some("confirmed fraud".into()),
                None,
            )
            .await;

        assert_eq!(first.id, second.id);
        assert_eq!(second.reason.as_deref(), Some("confirmed fraud"));
        assert_eq!(guard.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_inert_but_kept() {
        let guard = guard();
        guard
            .add(
                BlacklistKind::User,
                "user_1",
                None,
                Some(Utc::now() - chrono::Duration::hours(1)),
            )
            .await;

        assert!(!guard.is_blocked(&Identifiers::user("user_1")).await);
        assert_eq!(guard.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_unknown_id_is_not_found() {
        let guard = guard();
        let err = guard.remove(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SettlementError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_add_and_remove_emit_events() {
        let log = Arc::new(RiskEventLog::new());
        let guard = BlacklistGuard::new(log.clone());

        let entry = guard
            .add(BlacklistKind::User, "user_1", None, None)
            .await;
        guard.remove(entry.id).await.unwrap();

        let events = log.for_user("user_1").await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, RiskEventKind::BlacklistAdded);
        assert_eq!(events[0].severity, RiskSeverity::High);
        assert_eq!(events[1].kind, RiskEventKind::BlacklistRemoved);
        assert_eq!(events[1].severity, RiskSeverity::Medium);
    }
}
