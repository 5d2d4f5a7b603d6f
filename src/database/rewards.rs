//! Reward Repository - PostgreSQL operations for rewards using sqlx

use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::settlement::models::{Action, Reward, RewardStatus};

pub struct RewardRepository {
    pool: PgPool,
}

impl RewardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Commit a reward issue as one transaction: the action's REWARDED
    /// state and the reward row land together. The unique action_id
    /// constraint plus ON CONFLICT DO NOTHING makes a replay harmless.
    pub async fn commit_issue(&self, action: &Action, reward: &Reward) -> Result<(), String> {
        let proof = match &action.proof {
            Some(proof) => Some(
                serde_json::to_value(proof)
                    .map_err(|e| format!("Failed to serialize proof: {}", e))?,
            ),
            None => None,
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| format!("Failed to begin transaction: {}", e))?;

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
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("Failed to persist rewarded action: {}", e))?;

        sqlx::query(
            r#"
            INSERT INTO settlement.rewards
            (id, user_id, quest_id, action_id, asset, amount, points, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (action_id) DO NOTHING
            "#,
        )
        .bind(reward.id)
        .bind(&reward.user_id)
        .bind(reward.quest_id)
        .bind(reward.action_id)
        .bind(&reward.asset)
        .bind(reward.amount)
        .bind(reward.points)
        .bind(reward.status.as_str())
        .bind(reward.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("Failed to insert reward: {}", e))?;

        tx.commit()
            .await
            .map_err(|e| format!("Failed to commit reward issue: {}", e))?;

        debug!(reward_id = %reward.id, action_id = %reward.action_id, "Reward issue committed");
        Ok(())
    }

    pub async fn get_by_action(&self, action_id: Uuid) -> Result<Option<Reward>, String> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, quest_id, action_id, asset, amount, points, created_at
            FROM settlement.rewards
            WHERE action_id = $1
            "#,
        )
        .bind(action_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| format!("Failed to get reward: {}", e))?;

        Ok(row.map(|row| Reward {
            id: row.get("id"),
            user_id: row.get("user_id"),
            quest_id: row.get("quest_id"),
            action_id: row.get("action_id"),
            asset: row.get("asset"),
            amount: row.get("amount"),
            points: row.get("points"),
            status: RewardStatus::Completed,
            created_at: row.get("created_at"),
        }))
    }

    pub async fn list_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<Reward>, String> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, quest_id, action_id, asset, amount, points, created_at
            FROM settlement.rewards
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| format!("Failed to list rewards: {}", e))?;

        Ok(rows
            .into_iter()
            .map(|row| Reward {
                id: row.get("id"),
                user_id: row.get("user_id"),
                quest_id: row.get("quest_id"),
                action_id: row.get("action_id"),
                asset: row.get("asset"),
                amount: row.get("amount"),
                points: row.get("points"),
                status: RewardStatus::Completed,
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
