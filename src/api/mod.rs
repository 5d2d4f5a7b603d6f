//! HTTP API endpoints for the settlement service
//!
//! Provides REST APIs for:
//! - Actions (claim, submit, review decisions, review queue)
//! - Payouts (request, approve/reject/complete, balances)
//! - Risk (scores, event history, blacklist administration, stats)

pub mod actions;
pub mod payouts;
pub mod risk;

use axum::http::StatusCode;

use crate::error::SettlementError;

pub use actions::{create_router as create_actions_router, ActionsApiState};
pub use payouts::{create_router as create_payouts_router, PayoutsApiState};
pub use risk::{create_router as create_risk_router, RiskApiState};

/// Map a settlement failure to an HTTP response
pub fn error_response(err: SettlementError) -> (StatusCode, String) {
    let status = match &err {
        SettlementError::NotFound(_) => StatusCode::NOT_FOUND,
        SettlementError::InvalidTransition { .. }
        | SettlementError::AlreadyDecided { .. }
        | SettlementError::QuestNotOpen(_) => StatusCode::CONFLICT,
        SettlementError::LimitExceeded(_)
        | SettlementError::InvalidProof(_)
        | SettlementError::InsufficientEvidence => StatusCode::UNPROCESSABLE_ENTITY,
        SettlementError::Blocked(_) => StatusCode::FORBIDDEN,
        SettlementError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let (status, _) = error_response(SettlementError::NotFound("action x".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = error_response(SettlementError::AlreadyDecided {
            status: "rewarded".into(),
        });
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = error_response(SettlementError::Blocked("denied".into()));
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = error_response(SettlementError::InsufficientEvidence);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
