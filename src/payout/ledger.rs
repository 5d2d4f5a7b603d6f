//! Balance Ledger
//!
//! Per (user, asset) totals: issued by rewards, earmarked by pending
//! payouts, withdrawn by completed payouts. Every payout-side invariant
//! funnels through this one choke point, so a request can never spend
//! funds another pending request already holds.

use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::error;

use crate::error::{Result, SettlementError};

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AssetBalance {
    /// Total rewarded, all time
    pub issued: i64,
    /// Held by PENDING/PROCESSING payouts
    pub earmarked: i64,
    /// Settled by COMPLETED payouts
    pub withdrawn: i64,
}

impl AssetBalance {
    pub fn available(&self) -> i64 {
        self.issued - self.earmarked - self.withdrawn
    }
}

pub struct BalanceLedger {
    accounts: RwLock<HashMap<(String, String), AssetBalance>>,
}

impl BalanceLedger {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// Credit a freshly issued reward
    pub async fn credit(&self, user_id: &str, asset: &str, amount: i64) {
        let mut accounts = self.accounts.write().await;
        let balance = accounts
            .entry((user_id.to_string(), asset.to_string()))
            .or_default();
        balance.issued += amount;
    }

    /// Hold funds for a payout request. Fails without touching the
    /// balance if the amount exceeds what is available.
    pub async fn try_earmark(&self, user_id: &str, asset: &str, amount: i64) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        let balance = accounts
            .entry((user_id.to_string(), asset.to_string()))
            .or_default();

        if amount > balance.available() {
            return Err(SettlementError::LimitExceeded(format!(
                "requested {} {} but only {} available",
                amount,
                asset,
                balance.available()
            )));
        }

        balance.earmarked += amount;
        Ok(())
    }

    /// Release a hold after a payout is rejected
    pub async fn release(&self, user_id: &str, asset: &str, amount: i64) {
        let mut accounts = self.accounts.write().await;
        let balance = accounts
            .entry((user_id.to_string(), asset.to_string()))
            .or_default();

        if balance.earmarked < amount {
            error!(
                user_id = %user_id,
                asset = %asset,
                amount,
                earmarked = balance.earmarked,
                "Ledger invariant violation: releasing more than is earmarked"
            );
            balance.earmarked = 0;
            return;
        }
        balance.earmarked -= amount;
    }

    /// Convert a hold into a completed withdrawal
    pub async fn settle(&self, user_id: &str, asset: &str, amount: i64) {
        let mut accounts = self.accounts.write().await;
        let balance = accounts
            .entry((user_id.to_string(), asset.to_string()))
            .or_default();

        if balance.earmarked < amount {
            error!(
                user_id = %user_id,
                asset = %asset,
                amount,
                earmarked = balance.earmarked,
                "Ledger invariant violation: settling more than is earmarked"
            );
            balance.earmarked = 0;
        } else {
            balance.earmarked -= amount;
        }
        balance.withdrawn += amount;

        if balance.withdrawn > balance.issued {
            error!(
                user_id = %user_id,
                asset = %asset,
                withdrawn = balance.withdrawn,
                issued = balance.issued,
                "Ledger invariant violation: withdrawn exceeds issued"
            );
        }
    }

    pub async fn balance(&self, user_id: &str, asset: &str) -> AssetBalance {
        let accounts = self.accounts.read().await;
        accounts
            .get(&(user_id.to_string(), asset.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// All of a user's per-asset balances
    pub async fn balances_for(&self, user_id: &str) -> Vec<(String, AssetBalance)> {
        let accounts = self.accounts.read().await;
        accounts
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|((_, asset), balance)| (asset.clone(), *balance))
            .collect()
    }
}

impl Default for BalanceLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_available_follows_credits_and_holds() {
        let ledger = BalanceLedger::new();

        ledger.credit("user_1", "USDT", 100).await;
        assert_eq!(ledger.balance("user_1", "USDT").await.available(), 100);

        ledger.try_earmark("user_1", "USDT", 60).await.unwrap();
        assert_eq!(ledger.balance("user_1", "USDT").await.available(), 40);
    }

    #[tokio::test]
    async fn test_earmark_beyond_available_fails_cleanly() {
        let ledger = BalanceLedger::new();
        ledger.credit("user_1", "USDT", 30).await;

        let err = ledger.try_earmark("user_1", "USDT", 50).await.unwrap_err();
        assert!(matches!(err, SettlementError::LimitExceeded(_)));

        // Balance untouched by the failed hold.
        assert_eq!(ledger.balance("user_1", "USDT").await.available(), 30);
    }

    #[tokio::test]
    async fn test_concurrent_holds_cannot_double_spend() {
        let ledger = BalanceLedger::new();
        ledger.credit("user_1", "USDT", 100).await;

        ledger.try_earmark("user_1", "USDT", 80).await.unwrap();
        let second = ledger.try_earmark("user_1", "USDT", 80).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_release_restores_available() {
        let ledger = BalanceLedger::new();
        ledger.credit("user_1", "USDT", 100).await;
        ledger.try_earmark("user_1", "USDT", 100).await.unwrap();
        assert_eq!(ledger.balance("user_1", "USDT").await.available(), 0);

        ledger.release("user_1", "USDT", 100).await;
        assert_eq!(ledger.balance("user_1", "USDT").await.available(), 100);
    }

    #[tokio::test]
    async fn test_settle_moves_hold_to_withdrawn() {
        let ledger = BalanceLedger::new();
        ledger.credit("user_1", "USDT", 100).await;
        ledger.try_earmark("user_1", "USDT", 70).await.unwrap();
        ledger.settle("user_1", "USDT", 70).await;

        let balance = ledger.balance("user_1", "USDT").await;
        assert_eq!(balance.withdrawn, 70);
        assert_eq!(balance.earmarked, 0);
        assert_eq!(balance.available(), 30);
    }

    #[tokio::test]
    async fn test_balances_are_per_asset() {
        let ledger = BalanceLedger::new();
        ledger.credit("user_1", "USDT", 100).await;
        ledger.credit("user_1", "PTS", 500).await;

        assert_eq!(ledger.balance("user_1", "USDT").await.issued, 100);
        assert_eq!(ledger.balance("user_1", "PTS").await.issued, 500);
        assert_eq!(ledger.balances_for("user_1").await.len(), 2);
    }
}
