//! Verification Oracle
//!
//! External confirmation of auto-verifiable quest completions (is the
//! account really following, did the retweet happen, did the transfer
//! land). The settlement engine only sees a yes/no; a transport error
//! is reported upward and leaves the action in its retry-safe state.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use crate::settlement::models::{Action, Quest};

#[async_trait]
pub trait VerificationOracle: Send + Sync {
    /// Confirm whether the action's proof checks out externally
    async fn verify(&self, quest: &Quest, action: &Action) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct OracleClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub require_https: bool,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    quest_id: String,
    quest_type: &'a str,
    user_id: &'a str,
    proof: Option<&'a crate::settlement::models::ActionProof>,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    verified: bool,
}

/// HTTP oracle client
pub struct HttpVerificationOracle {
    client: Client,
    config: OracleClientConfig,
}

impl HttpVerificationOracle {
    pub fn new(config: OracleClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("Questline/0.1");

        if config.require_https {
            builder = builder.https_only(true);
            info!("HTTPS enforcement enabled for oracle calls");
        }

        let client = builder
            .build()
            .context("Failed to create oracle HTTP client")?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl VerificationOracle for HttpVerificationOracle {
    async fn verify(&self, quest: &Quest, action: &Action) -> Result<bool> {
        let url = format!("{}/verify", self.config.base_url.trim_end_matches('/'));
        let request = VerifyRequest {
            quest_id: quest.id.to_string(),
            quest_type: quest.quest_type.as_str(),
            user_id: &action.user_id,
            proof: action.proof.as_ref(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .context("Oracle request failed")?
            .error_for_status()
            .context("Oracle returned an error status")?;

        let body: VerifyResponse = response
            .json()
            .await
            .context("Oracle returned an invalid body")?;

        debug!(
            action_id = %action.id,
            quest_type = quest.quest_type.as_str(),
            verified = body.verified,
            "Oracle verification result"
        );

        Ok(body.verified)
    }
}

/// Oracle with a fixed verdict. Used when no oracle is configured
/// (deny everything, leaving submissions for retry or review) and in
/// tests.
pub struct FixedVerdictOracle {
    verdict: AtomicBool,
}

impl FixedVerdictOracle {
    pub fn new(verdict: bool) -> Self {
        Self {
            verdict: AtomicBool::new(verdict),
        }
    }

    pub fn set(&self, verdict: bool) {
        self.verdict.store(verdict, Ordering::SeqCst);
    }
}

#[async_trait]
impl VerificationOracle for FixedVerdictOracle {
    async fn verify(&self, _quest: &Quest, _action: &Action) -> Result<bool> {
        Ok(self.verdict.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::models::{QuestType, RewardSpec};

    #[tokio::test]
    async fn test_fixed_verdict_oracle_flips() {
        let oracle = FixedVerdictOracle::new(false);
        let quest = Quest::new(
            "Follow us",
            QuestType::ChannelFollow,
            RewardSpec {
                asset: "USDT".into(),
                amount: 5,
                points: 10,
            },
        );
        let action = Action::claim("user_1", quest.id);

        assert!(!oracle.verify(&quest, &action).await.unwrap());
        oracle.set(true);
        assert!(oracle.verify(&quest, &action).await.unwrap());
    }
}
