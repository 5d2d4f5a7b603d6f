//! Database Connection Pool using sqlx

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::database::actions::ActionRepository;
use crate::database::blacklist::BlacklistRepository;
use crate::database::payouts::PayoutRepository;
use crate::database::quests::QuestRepository;
use crate::database::rewards::RewardRepository;
use crate::database::risk_events::RiskEventRepository;

pub struct DatabasePool {
    pool: PgPool,
    quests: QuestRepository,
    actions: ActionRepository,
    rewards: RewardRepository,
    payouts: PayoutRepository,
    blacklist: BlacklistRepository,
    risk_events: RiskEventRepository,
}

impl DatabasePool {
    pub async fn new(connection_string: &str) -> Result<Self, String> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(connection_string)
            .await
            .map_err(|e| format!("Failed to connect to PostgreSQL: {}", e))?;

        info!("Connected to PostgreSQL");

        let quests = QuestRepository::new(pool.clone());
        let actions = ActionRepository::new(pool.clone());
        let rewards = RewardRepository::new(pool.clone());
        let payouts = PayoutRepository::new(pool.clone());
        let blacklist = BlacklistRepository::new(pool.clone());
        let risk_events = RiskEventRepository::new(pool.clone());

        Ok(Self {
            pool,
            quests,
            actions,
            rewards,
            payouts,
            blacklist,
            risk_events,
        })
    }

    pub async fn init_schema(&self) -> Result<(), String> {
        info!("Initializing database schema...");

        sqlx::query("CREATE SCHEMA IF NOT EXISTS settlement")
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to create settlement schema: {}", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settlement.quests (
                id UUID PRIMARY KEY,
                title TEXT NOT NULL,
                quest_type TEXT NOT NULL,
                asset TEXT NOT NULL,
                amount BIGINT NOT NULL,
                points BIGINT NOT NULL,
                per_user_cap INT NOT NULL,
                daily_cap INT NOT NULL,
                status TEXT NOT NULL,
                target JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create quests table: {}", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settlement.actions (
                id UUID PRIMARY KEY,
                user_id TEXT NOT NULL,
                quest_id UUID NOT NULL,
                status TEXT NOT NULL,
                proof JSONB,
                proof_digest TEXT,
                review_required BOOLEAN NOT NULL DEFAULT FALSE,
                reject_reason TEXT,
                claimed_at TIMESTAMPTZ NOT NULL,
                submitted_at TIMESTAMPTZ,
                verified_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create actions table: {}", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS actions_user_quest_idx \
             ON settlement.actions (user_id, quest_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create actions index: {}", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settlement.rewards (
                id UUID PRIMARY KEY,
                user_id TEXT NOT NULL,
                quest_id UUID NOT NULL,
                action_id UUID NOT NULL UNIQUE,
                asset TEXT NOT NULL,
                amount BIGINT NOT NULL,
                points BIGINT NOT NULL,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create rewards table: {}", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settlement.payouts (
                id UUID PRIMARY KEY,
                beneficiary_id TEXT NOT NULL,
                asset TEXT NOT NULL,
                amount BIGINT NOT NULL,
                to_address TEXT NOT NULL,
                status TEXT NOT NULL,
                tx_hash TEXT,
                proof_of_transfer TEXT,
                risk_level TEXT NOT NULL,
                reason TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                processed_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create payouts table: {}", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settlement.blacklist (
                id UUID PRIMARY KEY,
                kind TEXT NOT NULL,
                value TEXT NOT NULL,
                reason TEXT,
                expires_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                UNIQUE (kind, value)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create blacklist table: {}", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settlement.risk_events (
                id UUID PRIMARY KEY,
                user_id TEXT,
                kind TEXT NOT NULL,
                severity TEXT NOT NULL,
                details JSONB NOT NULL,
                ip TEXT,
                device TEXT,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create risk_events table: {}", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS risk_events_user_idx \
             ON settlement.risk_events (user_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to create risk_events index: {}", e))?;

        info!("Database schema initialized");
        Ok(())
    }

    pub fn quests(&self) -> &QuestRepository {
        &self.quests
    }

    pub fn actions(&self) -> &ActionRepository {
        &self.actions
    }

    pub fn rewards(&self) -> &RewardRepository {
        &self.rewards
    }

    pub fn payouts(&self) -> &PayoutRepository {
        &self.payouts
    }

    pub fn blacklist(&self) -> &BlacklistRepository {
        &self.blacklist
    }

    pub fn risk_events(&self) -> &RiskEventRepository {
        &self.risk_events
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
