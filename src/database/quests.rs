//! Quest Repository - PostgreSQL operations for quests using sqlx

use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::settlement::models::{Quest, QuestStatus, QuestTarget, QuestType, RewardSpec};

pub struct QuestRepository {
    pool: PgPool,
}

impl QuestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, quest: &Quest) -> Result<(), String> {
        let target = serde_json::to_value(&quest.target)
            .map_err(|e| format!("Failed to serialize quest target: {}", e))?;

        sqlx::query(
            r#"
            INSERT INTO settlement.quests
            (id, title, quest_type, asset, amount, points, per_user_cap, daily_cap, status, target, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                status = EXCLUDED.status,
                asset = EXCLUDED.asset,
                amount = EXCLUDED.amount,
                points = EXCLUDED.points,
                per_user_cap = EXCLUDED.per_user_cap,
                daily_cap = EXCLUDED.daily_cap,
                target = EXCLUDED.target
            "#,
        )
        .bind(quest.id)
        .bind(&quest.title)
        .bind(quest.quest_type.as_str())
        .bind(&quest.reward.asset)
        .bind(quest.reward.amount)
        .bind(quest.reward.points)
        .bind(quest.per_user_cap as i32)
        .bind(quest.daily_cap as i32)
        .bind(quest.status.as_str())
        .bind(target)
        .bind(quest.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to upsert quest: {}", e))?;

        debug!(quest_id = %quest.id, "Quest persisted");
        Ok(())
    }

    pub async fn get(&self, quest_id: Uuid) -> Result<Option<Quest>, String> {
        let row = sqlx::query(
            r#"
            SELECT id, title, quest_type, asset, amount, points, per_user_cap,
                   daily_cap, status, target, created_at
            FROM settlement.quests
            WHERE id = $1
            "#,
        )
        .bind(quest_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| format!("Failed to get quest: {}", e))?;

        if let Some(row) = row {
            let status: String = row.get("status");
            let quest_type: String = row.get("quest_type");
            let target: serde_json::Value = row.get("target");
            let per_user_cap: i32 = row.get("per_user_cap");
            let daily_cap: i32 = row.get("daily_cap");

            Ok(Some(Quest {
                id: row.get("id"),
                title: row.get("title"),
                quest_type: QuestType::parse(&quest_type),
                reward: RewardSpec {
                    asset: row.get("asset"),
                    amount: row.get("amount"),
                    points: row.get("points"),
                },
                per_user_cap: per_user_cap.max(0) as u32,
                daily_cap: daily_cap.max(0) as u32,
                status: QuestStatus::parse(&status).unwrap_or(QuestStatus::Draft),
                target: serde_json::from_value::<QuestTarget>(target).unwrap_or_default(),
                created_at: row.get("created_at"),
            }))
        } else {
            Ok(None)
        }
    }
}
