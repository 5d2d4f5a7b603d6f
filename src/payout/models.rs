//! Payout Data Model
//!
//! A withdrawal request converting issued reward balance into an
//! external transfer. Mutated only by the payout state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::risk::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PayoutStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PayoutStatus::Completed | PayoutStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Completed => "completed",
            PayoutStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PayoutStatus::Pending),
            "processing" => Some(PayoutStatus::Processing),
            "completed" => Some(PayoutStatus::Completed),
            "failed" => Some(PayoutStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payout {
    pub id: Uuid,
    pub beneficiary_id: String,
    pub asset: String,
    pub amount: i64,
    pub to_address: String,
    pub status: PayoutStatus,
    pub tx_hash: Option<String>,
    pub proof_of_transfer: Option<String>,
    /// Risk level observed when the request was made; shown to the
    /// reviewing admin, never re-evaluated afterwards
    pub risk_level: RiskLevel,
    /// Set when the payout fails
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Payout {
    pub fn request(
        beneficiary_id: &str,
        asset: &str,
        amount: i64,
        to_address: &str,
        risk_level: RiskLevel,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            beneficiary_id: beneficiary_id.to_string(),
            asset: asset.to_string(),
            amount,
            to_address: to_address.to_string(),
            status: PayoutStatus::Pending,
            tx_hash: None,
            proof_of_transfer: None,
            risk_level,
            reason: None,
            created_at: Utc::now(),
            processed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!PayoutStatus::Pending.is_terminal());
        assert!(!PayoutStatus::Processing.is_terminal());
        assert!(PayoutStatus::Completed.is_terminal());
        assert!(PayoutStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            PayoutStatus::Pending,
            PayoutStatus::Processing,
            PayoutStatus::Completed,
            PayoutStatus::Failed,
        ] {
            assert_eq!(PayoutStatus::parse(status.as_str()), Some(status));
        }
    }
}
