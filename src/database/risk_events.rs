//! Risk Event Repository - PostgreSQL operations for the event log using sqlx
//!
//! Insert-only, matching the append-only in-process log.

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::risk::events::{RiskEvent, RiskEventKind, RiskSeverity};

pub struct RiskEventRepository {
    pool: PgPool,
}

impl RiskEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, event: &RiskEvent) -> Result<(), String> {
        sqlx::query(
            r#"
            INSERT INTO settlement.risk_events
            (id, user_id, kind, severity, details, ip, device, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(event.id)
        .bind(&event.user_id)
        .bind(event.kind.as_str())
        .bind(event.severity.as_str())
        .bind(&event.details)
        .bind(&event.ip)
        .bind(&event.device)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to insert risk event: {}", e))?;

        Ok(())
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<RiskEvent>, String> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, kind, severity, details, ip, device, created_at
            FROM settlement.risk_events
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("Failed to list risk events: {}", e))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let kind: String = row.get("kind");
                let severity: String = row.get("severity");
                let id: Uuid = row.get("id");
                Some(RiskEvent {
                    id,
                    user_id: row.get("user_id"),
                    kind: RiskEventKind::parse(&kind)?,
                    severity: RiskSeverity::parse(&severity)?,
                    details: row.get("details"),
                    ip: row.get("ip"),
                    device: row.get("device"),
                    created_at: row.get("created_at"),
                })
            })
            .collect())
    }
}
