//! Risk API Endpoints
//!
//! Scores, event history, blacklist administration, and service stats.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error_response;
use crate::payout::PayoutManager;
use crate::risk::{
    BlacklistEntry, BlacklistGuard, BlacklistKind, RiskAssessment, RiskEvent, RiskEventLog,
    RiskScorer,
};
use crate::settlement::SettlementManager;

/// API state for risk endpoints
#[derive(Clone)]
pub struct RiskApiState {
    pub scorer: Arc<RiskScorer>,
    pub blacklist: Arc<BlacklistGuard>,
    pub risk_log: Arc<RiskEventLog>,
    pub settlement: Arc<SettlementManager>,
    pub payouts: Arc<PayoutManager>,
}

// Request/response types

#[derive(Debug, Deserialize)]
pub struct AddBlacklistRequest {
    pub kind: BlacklistKind,
    pub value: String,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct BlacklistResponse {
    pub total: usize,
    pub entries: Vec<BlacklistEntrySummary>,
}

#[derive(Debug, Serialize)]
pub struct BlacklistEntrySummary {
    pub id: Uuid,
    pub kind: BlacklistKind,
    pub value: String,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_expired: bool,
}

impl From<BlacklistEntry> for BlacklistEntrySummary {
    fn from(entry: BlacklistEntry) -> Self {
        let is_expired = entry.is_expired();
        Self {
            id: entry.id,
            kind: entry.kind,
            value: entry.value,
            reason: entry.reason,
            expires_at: entry.expires_at,
            is_expired,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserEventsResponse {
    pub user_id: String,
    pub total: usize,
    pub events: Vec<RiskEvent>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_actions: usize,
    pub pending_reviews: usize,
    pub pending_payouts: usize,
    pub risk_events: usize,
    pub blacklist_entries: usize,
}

// Endpoints

/// GET /risk/score/{user_id} - Current risk assessment
pub async fn get_score(
    State(state): State<RiskApiState>,
    Path(user_id): Path<String>,
) -> Json<RiskAssessment> {
    Json(state.scorer.score(&user_id).await)
}

/// GET /risk/events/{user_id} - A user's event history
pub async fn get_events(
    State(state): State<RiskApiState>,
    Path(user_id): Path<String>,
) -> Json<UserEventsResponse> {
    let events = state.risk_log.for_user(&user_id).await;
    Json(UserEventsResponse {
        user_id,
        total: events.len(),
        events,
    })
}

/// POST /risk/blacklist - Add or refresh a deny-list record
pub async fn add_blacklist(
    State(state): State<RiskApiState>,
    Json(payload): Json<AddBlacklistRequest>,
) -> Json<BlacklistEntrySummary> {
    let entry = state
        .blacklist
        .add(
            payload.kind,
            &payload.value,
            payload.reason,
            payload.expires_at,
        )
        .await;
    Json(entry.into())
}

/// DELETE /risk/blacklist/{id} - Remove a deny-list record
pub async fn remove_blacklist(
    State(state): State<RiskApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BlacklistEntrySummary>, (StatusCode, String)> {
    state
        .blacklist
        .remove(id)
        .await
        .map(|entry| Json(entry.into()))
        .map_err(error_response)
}

/// GET /risk/blacklist - Every record, expired ones included
pub async fn list_blacklist(State(state): State<RiskApiState>) -> Json<BlacklistResponse> {
    let entries: Vec<BlacklistEntrySummary> = state
        .blacklist
        .list()
        .await
        .into_iter()
        .map(Into::into)
        .collect();
    Json(BlacklistResponse {
        total: entries.len(),
        entries,
    })
}

/// GET /risk/stats - Overall service stats
pub async fn get_stats(State(state): State<RiskApiState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        total_actions: state.settlement.action_count().await,
        pending_reviews: state.settlement.pending_reviews().await.len(),
        pending_payouts: state.payouts.pending().await.len(),
        risk_events: state.risk_log.total().await,
        blacklist_entries: state.blacklist.list().await.len(),
    })
}

/// Create the risk API router
pub fn create_router(state: RiskApiState) -> Router {
    Router::new()
        .route("/score/{user_id}", get(get_score))
        .route("/events/{user_id}", get(get_events))
        .route("/blacklist", post(add_blacklist).get(list_blacklist))
        .route("/blacklist/{id}", delete(remove_blacklist))
        .route("/stats", get(get_stats))
        .with_state(state)
}
