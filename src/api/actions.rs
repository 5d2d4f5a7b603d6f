//! Action API Endpoints
//!
//! Quest catalog administration, claiming, proof submission, and the
//! manual-review surface.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error_response;
use crate::risk::Identifiers;
use crate::settlement::{
    Action, ActionProof, Quest, QuestStatus, QuestTarget, QuestType, Reward, RewardSpec,
    SettlementManager, SubmitOutcome,
};

/// API state for action endpoints
#[derive(Clone)]
pub struct ActionsApiState {
    pub settlement: Arc<SettlementManager>,
}

// Request types

#[derive(Debug, Deserialize)]
pub struct CreateQuestRequest {
    pub title: String,
    pub quest_type: QuestType,
    pub asset: String,
    pub amount: i64,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub per_user_cap: u32,
    #[serde(default)]
    pub daily_cap: u32,
    #[serde(default)]
    pub target: QuestTarget,
    /// Create directly active instead of draft
    #[serde(default)]
    pub activate: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuestStatusRequest {
    pub status: QuestStatus,
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub user_id: String,
    pub quest_id: Uuid,
    pub device: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub proof: ActionProof,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

// Response types

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub action_id: Uuid,
    pub outcome: String,
    pub reward: Option<Reward>,
}

#[derive(Debug, Serialize)]
pub struct ReviewQueueResponse {
    pub total: usize,
    pub actions: Vec<Action>,
}

// Endpoints

/// POST /actions/quests - Create a quest
pub async fn create_quest(
    State(state): State<ActionsApiState>,
    Json(payload): Json<CreateQuestRequest>,
) -> Json<Quest> {
    let mut quest = Quest::new(
        &payload.title,
        payload.quest_type,
        RewardSpec {
            asset: payload.asset,
            amount: payload.amount,
            points: payload.points,
        },
    )
    .with_caps(payload.per_user_cap, payload.daily_cap)
    .with_target(payload.target);

    if payload.activate {
        quest = quest.with_status(QuestStatus::Active);
    }

    Json(state.settlement.create_quest(quest).await)
}

/// PUT /actions/quests/{quest_id}/status - Move a quest through its lifecycle
pub async fn update_quest_status(
    State(state): State<ActionsApiState>,
    Path(quest_id): Path<Uuid>,
    Json(payload): Json<UpdateQuestStatusRequest>,
) -> Result<Json<Quest>, (StatusCode, String)> {
    state
        .settlement
        .set_quest_status(quest_id, payload.status)
        .await
        .map(Json)
        .map_err(error_response)
}

/// GET /actions/quests/{quest_id}
pub async fn get_quest(
    State(state): State<ActionsApiState>,
    Path(quest_id): Path<Uuid>,
) -> Result<Json<Quest>, (StatusCode, String)> {
    state
        .settlement
        .get_quest(quest_id)
        .await
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, format!("quest {} not found", quest_id)))
}

/// GET /actions/quests - List the catalog
pub async fn list_quests(State(state): State<ActionsApiState>) -> Json<Vec<Quest>> {
    Json(state.settlement.list_quests().await)
}

/// POST /actions/claim - Start an attempt
pub async fn claim(
    State(state): State<ActionsApiState>,
    Json(payload): Json<ClaimRequest>,
) -> Result<Json<Action>, (StatusCode, String)> {
    let identifiers = Identifiers::user(&payload.user_id)
        .with_device(payload.device.as_deref())
        .with_ip(payload.ip.as_deref());

    state
        .settlement
        .claim(&payload.user_id, payload.quest_id, &identifiers)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /actions/{action_id}/submit - Submit proof
pub async fn submit(
    State(state): State<ActionsApiState>,
    Path(action_id): Path<Uuid>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, (StatusCode, String)> {
    let outcome = state
        .settlement
        .submit(action_id, payload.proof)
        .await
        .map_err(error_response)?;

    let (outcome_str, reward) = match outcome {
        SubmitOutcome::Rewarded(reward) => ("rewarded", Some(reward)),
        ref other => (other.as_str(), None),
    };

    Ok(Json(SubmitResponse {
        action_id,
        outcome: outcome_str.to_string(),
        reward,
    }))
}

/// POST /actions/{action_id}/approve - Manual approval
pub async fn approve(
    State(state): State<ActionsApiState>,
    Path(action_id): Path<Uuid>,
) -> Result<Json<Reward>, (StatusCode, String)> {
    state
        .settlement
        .approve(action_id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /actions/{action_id}/reject - Manual rejection
pub async fn reject(
    State(state): State<ActionsApiState>,
    Path(action_id): Path<Uuid>,
    Json(payload): Json<RejectRequest>,
) -> Result<Json<Action>, (StatusCode, String)> {
    state
        .settlement
        .reject(action_id, payload.reason)
        .await
        .map(Json)
        .map_err(error_response)
}

/// GET /actions/{action_id}
pub async fn get_action(
    State(state): State<ActionsApiState>,
    Path(action_id): Path<Uuid>,
) -> Result<Json<Action>, (StatusCode, String)> {
    state
        .settlement
        .get_action(action_id)
        .await
        .map(Json)
        .ok_or((
            StatusCode::NOT_FOUND,
            format!("action {} not found", action_id),
        ))
}

/// GET /actions/user/{user_id} - A user's attempts
pub async fn actions_for_user(
    State(state): State<ActionsApiState>,
    Path(user_id): Path<String>,
) -> Json<Vec<Action>> {
    Json(state.settlement.actions_for_user(&user_id).await)
}

/// GET /actions/reviews/pending - The manual-review queue
pub async fn pending_reviews(State(state): State<ActionsApiState>) -> Json<ReviewQueueResponse> {
    let actions = state.settlement.pending_reviews().await;
    Json(ReviewQueueResponse {
        total: actions.len(),
        actions,
    })
}

/// Create the actions API router
pub fn create_router(state: ActionsApiState) -> Router {
    Router::new()
        .route("/quests", post(create_quest).get(list_quests))
        .route("/quests/{quest_id}", get(get_quest))
        .route("/quests/{quest_id}/status", put(update_quest_status))
        .route("/claim", post(claim))
        .route("/reviews/pending", get(pending_reviews))
        .route("/user/{user_id}", get(actions_for_user))
        .route("/{action_id}", get(get_action))
        .route("/{action_id}/submit", post(submit))
        .route("/{action_id}/approve", post(approve))
        .route("/{action_id}/reject", post(reject))
        .with_state(state)
}
