//! Payout API Endpoints
//!
//! Withdrawal requests and the admin decisions that settle them.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error_response;
use crate::payout::{AssetBalance, Payout, PayoutManager};
use crate::risk::Identifiers;

/// API state for payout endpoints
#[derive(Clone)]
pub struct PayoutsApiState {
    pub payouts: Arc<PayoutManager>,
}

// Request types

#[derive(Debug, Deserialize)]
pub struct RequestPayoutRequest {
    pub user_id: String,
    pub asset: String,
    pub amount: i64,
    pub to_address: String,
    pub device: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApprovePayoutRequest {
    pub tx_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectPayoutRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompletePayoutRequest {
    pub tx_hash: Option<String>,
    pub proof: Option<String>,
}

// Response types

#[derive(Debug, Serialize)]
pub struct BalanceEntry {
    pub asset: String,
    pub issued: i64,
    pub earmarked: i64,
    pub withdrawn: i64,
    pub available: i64,
}

impl BalanceEntry {
    fn from_balance(asset: String, balance: AssetBalance) -> Self {
        Self {
            asset,
            issued: balance.issued,
            earmarked: balance.earmarked,
            withdrawn: balance.withdrawn,
            available: balance.available(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserPayoutsResponse {
    pub user_id: String,
    pub balances: Vec<BalanceEntry>,
    pub payouts: Vec<Payout>,
}

#[derive(Debug, Serialize)]
pub struct PendingPayoutsResponse {
    pub total: usize,
    pub payouts: Vec<Payout>,
}

// Endpoints

/// POST /payouts/request - Request a withdrawal
pub async fn request_payout(
    State(state): State<PayoutsApiState>,
    Json(payload): Json<RequestPayoutRequest>,
) -> Result<Json<Payout>, (StatusCode, String)> {
    let identifiers = Identifiers::user(&payload.user_id)
        .with_device(payload.device.as_deref())
        .with_ip(payload.ip.as_deref());

    state
        .payouts
        .request(
            &payload.user_id,
            &payload.asset,
            payload.amount,
            &payload.to_address,
            &identifiers,
        )
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /payouts/{payout_id}/approve
pub async fn approve_payout(
    State(state): State<PayoutsApiState>,
    Path(payout_id): Path<Uuid>,
    Json(payload): Json<ApprovePayoutRequest>,
) -> Result<Json<Payout>, (StatusCode, String)> {
    state
        .payouts
        .approve(payout_id, payload.tx_hash)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /payouts/{payout_id}/reject
pub async fn reject_payout(
    State(state): State<PayoutsApiState>,
    Path(payout_id): Path<Uuid>,
    Json(payload): Json<RejectPayoutRequest>,
) -> Result<Json<Payout>, (StatusCode, String)> {
    state
        .payouts
        .reject(payout_id, payload.reason)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /payouts/{payout_id}/complete
pub async fn complete_payout(
    State(state): State<PayoutsApiState>,
    Path(payout_id): Path<Uuid>,
    Json(payload): Json<CompletePayoutRequest>,
) -> Result<Json<Payout>, (StatusCode, String)> {
    state
        .payouts
        .complete(payout_id, payload.tx_hash, payload.proof)
        .await
        .map(Json)
        .map_err(error_response)
}

/// GET /payouts/{payout_id}
pub async fn get_payout(
    State(state): State<PayoutsApiState>,
    Path(payout_id): Path<Uuid>,
) -> Result<Json<Payout>, (StatusCode, String)> {
    state.payouts.get_payout(payout_id).await.map(Json).ok_or((
        StatusCode::NOT_FOUND,
        format!("payout {} not found", payout_id),
    ))
}

/// GET /payouts/user/{user_id} - A user's payouts and balances
pub async fn payouts_for_user(
    State(state): State<PayoutsApiState>,
    Path(user_id): Path<String>,
) -> Json<UserPayoutsResponse> {
    let payouts = state.payouts.payouts_for_user(&user_id).await;
    let balances = state
        .payouts
        .ledger()
        .balances_for(&user_id)
        .await
        .into_iter()
        .map(|(asset, balance)| BalanceEntry::from_balance(asset, balance))
        .collect();

    Json(UserPayoutsResponse {
        user_id,
        balances,
        payouts,
    })
}

/// GET /payouts/pending - PENDING payouts awaiting a decision
pub async fn pending_payouts(State(state): State<PayoutsApiState>) -> Json<PendingPayoutsResponse> {
    let payouts = state.payouts.pending().await;
    Json(PendingPayoutsResponse {
        total: payouts.len(),
        payouts,
    })
}

/// Create the payouts API router
pub fn create_router(state: PayoutsApiState) -> Router {
    Router::new()
        .route("/request", post(request_payout))
        .route("/pending", get(pending_payouts))
        .route("/user/{user_id}", get(payouts_for_user))
        .route("/{payout_id}", get(get_payout))
        .route("/{payout_id}/approve", post(approve_payout))
        .route("/{payout_id}/reject", post(reject_payout))
        .route("/{payout_id}/complete", post(complete_payout))
        .with_state(state)
}
