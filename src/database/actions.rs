//! Action Repository - PostgreSQL operations for actions using sqlx

use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::settlement::models::{Action, ActionProof, ActionStatus};

pub struct ActionRepository {
    pool: PgPool,
}

impl ActionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, action: &Action) -> Result<(), String> {
        let proof = match &action.proof {
            Some(proof) => Some(
                serde_json::to_value(proof)
                    .map_err(|e| format!("Failed to serialize proof: {}", e))?,
            ),
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO settlement.actions
            (id, user_id, quest_id, status, proof, proof_digest, review_required,
             reject_reason, claimed_at, submitted_at, verified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                proof = EXCLUDED.proof,
                proof_digest = EXCLUDED.proof_digest,
                review_required = EXCLUDED.review_required,
                reject_reason = EXCLUDED.reject_reason,
                submitted_at = EXCLUDED.submitted_at,
                verified_at = EXCLUDED.verified_at
            "#,
        )
        .bind(action.id)
        .bind(&action.user_id)
        .bind(action.quest_id)
        .bind(action.status.as_str())
        .bind(proof)
        .bind(&action.proof_digest)
        .bind(action.review_required)
        .bind(&action.reject_reason)
        .bind(action.claimed_at)
        .bind(action.submitted_at)
        .bind(action.verified_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to upsert action: {}", e))?;

        debug!(action_id = %action.id, status = action.status.as_str(), "Action persisted");
        Ok(())
    }

    pub async fn get(&self, action_id: Uuid) -> Result<Option<Action>, String> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, quest_id, status, proof, proof_digest, review_required,
                   reject_reason, claimed_at, submitted_at, verified_at
            FROM settlement.actions
            WHERE id = $1
            "#,
        )
        .bind(action_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| format!("Failed to get action: {}", e))?;

        if let Some(row) = row {
            let status: String = row.get("status");
            let proof: Option<serde_json::Value> = row.get("proof");

            Ok(Some(Action {
                id: row.get("id"),
                user_id: row.get("user_id"),
                quest_id: row.get("quest_id"),
                status: ActionStatus::parse(&status).unwrap_or(ActionStatus::Claimed),
                proof: proof.and_then(|v| serde_json::from_value::<ActionProof>(v).ok()),
                proof_digest: row.get("proof_digest"),
                review_required: row.get("review_required"),
                reject_reason: row.get("reject_reason"),
                claimed_at: row.get("claimed_at"),
                submitted_at: row.get("submitted_at"),
                verified_at: row.get("verified_at"),
            }))
        } else {
            Ok(None)
        }
    }

    /// Conditional status transition; returns false when the row was
    /// not in the expected status (someone else decided first).
    pub async fn transition(
        &self,
        action_id: Uuid,
        from: ActionStatus,
        to: ActionStatus,
    ) -> Result<bool, String> {
        let result = sqlx::query(
            r#"
            UPDATE settlement.actions
            SET status = $3
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(action_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to transition action: {}", e))?;

        Ok(result.rows_affected() > 0)
    }
}
