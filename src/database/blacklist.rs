//! Blacklist Repository - PostgreSQL operations for the deny-list using sqlx

use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::risk::blacklist::{BlacklistEntry, BlacklistKind};

pub struct BlacklistRepository {
    pool: PgPool,
}

impl BlacklistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, entry: &BlacklistEntry) -> Result<(), String> {
        sqlx::query(
            r#"
            INSERT INTO settlement.blacklist
            (id, kind, value, reason, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (kind, value) DO UPDATE SET
                reason = EXCLUDED.reason,
                expires_at = EXCLUDED.expires_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(entry.id)
        .bind(entry.kind.as_str())
        .bind(&entry.value)
        .bind(&entry.reason)
        .bind(entry.expires_at)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to upsert blacklist entry: {}", e))?;

        debug!(entry_id = %entry.id, kind = entry.kind.as_str(), "Blacklist entry persisted");
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, String> {
        let result = sqlx::query("DELETE FROM settlement.blacklist WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to delete blacklist entry: {}", e))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list(&self) -> Result<Vec<BlacklistEntry>, String> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, value, reason, expires_at, created_at, updated_at
            FROM settlement.blacklist
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("Failed to list blacklist entries: {}", e))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let kind: String = row.get("kind");
                Some(BlacklistEntry {
                    id: row.get("id"),
                    kind: BlacklistKind::parse(&kind)?,
                    value: row.get("value"),
                    reason: row.get("reason"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                    updated_at: row.get("updated_at"),
                })
            })
            .collect())
    }
}
