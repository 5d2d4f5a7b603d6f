//! Payout Repository - PostgreSQL operations for payouts using sqlx

use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::payout::models::{Payout, PayoutStatus};
use crate::risk::RiskLevel;

pub struct PayoutRepository {
    pool: PgPool,
}

impl PayoutRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, payout: &Payout) -> Result<(), String> {
        sqlx::query(
            r#"
            INSERT INTO settlement.payouts
            (id, beneficiary_id, asset, amount, to_address, status, tx_hash,
             proof_of_transfer, risk_level, reason, created_at, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(payout.id)
        .bind(&payout.beneficiary_id)
        .bind(&payout.asset)
        .bind(payout.amount)
        .bind(&payout.to_address)
        .bind(payout.status.as_str())
        .bind(&payout.tx_hash)
        .bind(&payout.proof_of_transfer)
        .bind(payout.risk_level.as_str())
        .bind(&payout.reason)
        .bind(payout.created_at)
        .bind(payout.processed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to insert payout: {}", e))?;

        debug!(payout_id = %payout.id, "Payout persisted");
        Ok(())
    }

    /// Write-through of a decided payout, guarded against racing a
    /// decision already persisted: terminal rows are never overwritten.
    pub async fn upsert(&self, payout: &Payout) -> Result<(), String> {
        sqlx::query(
            r#"
            INSERT INTO settlement.payouts
            (id, beneficiary_id, asset, amount, to_address, status, tx_hash,
             proof_of_transfer, risk_level, reason, created_at, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                tx_hash = EXCLUDED.tx_hash,
                proof_of_transfer = EXCLUDED.proof_of_transfer,
                reason = EXCLUDED.reason,
                processed_at = EXCLUDED.processed_at
            WHERE settlement.payouts.status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(payout.id)
        .bind(&payout.beneficiary_id)
        .bind(&payout.asset)
        .bind(payout.amount)
        .bind(&payout.to_address)
        .bind(payout.status.as_str())
        .bind(&payout.tx_hash)
        .bind(&payout.proof_of_transfer)
        .bind(payout.risk_level.as_str())
        .bind(&payout.reason)
        .bind(payout.created_at)
        .bind(payout.processed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to upsert payout: {}", e))?;

        Ok(())
    }

    pub async fn get(&self, payout_id: Uuid) -> Result<Option<Payout>, String> {
        let row = sqlx::query(
            r#"
            SELECT id, beneficiary_id, asset, amount, to_address, status, tx_hash,
                   proof_of_transfer, risk_level, reason, created_at, processed_at
            FROM settlement.payouts
            WHERE id = $1
            "#,
        )
        .bind(payout_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| format!("Failed to get payout: {}", e))?;

        if let Some(row) = row {
            let status: String = row.get("status");
            let risk_level: String = row.get("risk_level");

            Ok(Some(Payout {
                id: row.get("id"),
                beneficiary_id: row.get("beneficiary_id"),
                asset: row.get("asset"),
                amount: row.get("amount"),
                to_address: row.get("to_address"),
                status: PayoutStatus::parse(&status).unwrap_or(PayoutStatus::Pending),
                tx_hash: row.get("tx_hash"),
                proof_of_transfer: row.get("proof_of_transfer"),
                risk_level: RiskLevel::parse(&risk_level).unwrap_or(RiskLevel::Low),
                reason: row.get("reason"),
                created_at: row.get("created_at"),
                processed_at: row.get("processed_at"),
            }))
        } else {
            Ok(None)
        }
    }

    pub async fn list_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<Payout>, String> {
        let rows = sqlx::query(
            r#"
            SELECT id, beneficiary_id, asset, amount, to_address, status, tx_hash,
                   proof_of_transfer, risk_level, reason, created_at, processed_at
            FROM settlement.payouts
            WHERE beneficiary_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("Failed to list payouts: {}", e))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let status: String = row.get("status");
                let risk_level: String = row.get("risk_level");
                Payout {
                    id: row.get("id"),
                    beneficiary_id: row.get("beneficiary_id"),
                    asset: row.get("asset"),
                    amount: row.get("amount"),
                    to_address: row.get("to_address"),
                    status: PayoutStatus::parse(&status).unwrap_or(PayoutStatus::Pending),
                    tx_hash: row.get("tx_hash"),
                    proof_of_transfer: row.get("proof_of_transfer"),
                    risk_level: RiskLevel::parse(&risk_level).unwrap_or(RiskLevel::Low),
                    reason: row.get("reason"),
                    created_at: row.get("created_at"),
                    processed_at: row.get("processed_at"),
                }
            })
            .collect())
    }
}
