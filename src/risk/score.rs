//! Risk Scoring
//!
//! Derives a numeric trust signal from the event log plus account
//! heuristics. Read-only: the scorer never writes events, callers do.
//! Given the same log and evaluation instant the result is identical,
//! so fixtures can pin the clock through `score_at`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::risk::events::{RiskEventKind, RiskEventLog};

/// Qualitative risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

/// Scoring output: the number, the tier, and the signals behind them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub user_id: String,
    pub score: i32,
    pub level: RiskLevel,
    pub factors: Vec<String>,
}

/// Tunable scoring parameters
#[derive(Debug, Clone)]
pub struct RiskPolicy {
    /// Scores above this are medium
    pub medium_threshold: i32,
    /// Scores above this are high
    pub high_threshold: i32,
    /// Events older than this contribute at half weight
    pub half_life_days: i64,
    /// Events older than this are ignored entirely
    pub stale_days: i64,
    /// Accounts first seen within this window get a score bump
    pub new_account_days: i64,
    pub new_account_bump: i32,
    /// More claims than this inside the window is a velocity anomaly
    pub velocity_window_minutes: i64,
    pub velocity_max_claims: usize,
    pub velocity_bump: i32,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            medium_threshold: 20,
            high_threshold: 50,
            half_life_days: 30,
            stale_days: 90,
            new_account_days: 7,
            new_account_bump: 10,
            velocity_window_minutes: 60,
            velocity_max_claims: 10,
            velocity_bump: 15,
        }
    }
}

/// Computes risk assessments over the shared event log
pub struct RiskScorer {
    log: Arc<RiskEventLog>,
    policy: RiskPolicy,
}

impl RiskScorer {
    pub fn new(log: Arc<RiskEventLog>, policy: RiskPolicy) -> Self {
        Self { log, policy }
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    /// Assess a user at the current instant
    pub async fn score(&self, user_id: &str) -> RiskAssessment {
        self.score_at(user_id, Utc::now()).await
    }

    /// Assess a user at a fixed instant
    pub async fn score_at(&self, user_id: &str, now: DateTime<Utc>) -> RiskAssessment {
        let events = self.log.for_user(user_id).await;
        let mut score = 0i32;
        let mut factors = Vec::new();

        let stale_cutoff = now - Duration::days(self.policy.stale_days);
        let half_life_cutoff = now - Duration::days(self.policy.half_life_days);

        // Weighted event sum; older events count half, stale ones not at all.
        let mut event_points = 0i32;
        let mut counted = 0usize;
        for event in events.iter().filter(|e| e.created_at >= stale_cutoff) {
            let weight = event.severity.weight();
            event_points += if event.created_at < half_life_cutoff {
                weight / 2
            } else {
                weight
            };
            counted += 1;
        }
        if event_points > 0 {
            score += event_points;
            factors.push(format!(
                "{} risk events in the last {} days ({} points)",
                counted, self.policy.stale_days, event_points
            ));
        }

        // Account age: first-seen inside the new-account window.
        let first_seen = events.iter().map(|e| e.created_at).min();
        match first_seen {
            Some(first) if now - first < Duration::days(self.policy.new_account_days) => {
                score += self.policy.new_account_bump;
                factors.push("new account".to_string());
            }
            None => {
                score += self.policy.new_account_bump;
                factors.push("no activity history".to_string());
            }
            _ => {}
        }

        // Claim velocity inside the rolling window.
        let window_start = now - Duration::minutes(self.policy.velocity_window_minutes);
        let claims = events
            .iter()
            .filter(|e| e.kind == RiskEventKind::ActionClaimed && e.created_at >= window_start)
            .count();
        if claims > self.policy.velocity_max_claims {
            score += self.policy.velocity_bump;
            factors.push(format!(
                "{} claims in {} minutes",
                claims, self.policy.velocity_window_minutes
            ));
        }

        let level = if score > self.policy.high_threshold {
            RiskLevel::High
        } else if score > self.policy.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        RiskAssessment {
            user_id: user_id.to_string(),
            score,
            level,
            factors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::events::{RiskEvent, RiskSeverity};

    fn scorer_with_log() -> (Arc<RiskEventLog>, RiskScorer) {
        let log = Arc::new(RiskEventLog::new());
        let scorer = RiskScorer::new(log.clone(), RiskPolicy::default());
        (log, scorer)
    }

    #[tokio::test]
    async fn test_unknown_user_is_low_with_new_account_factor() {
        let (_, scorer) = scorer_with_log();
        let assessment = scorer.score("nobody").await;

        assert_eq!(assessment.level, RiskLevel::Low);
        assert_eq!(assessment.score, 10);
        assert!(assessment.factors.iter().any(|f| f.contains("history")));
    }

    #[tokio::test]
    async fn test_high_severity_events_raise_level() {
        let (log, scorer) = scorer_with_log();

        for _ in 0..2 {
            log.append(RiskEvent::new(
                RiskEventKind::DuplicateProof,
                RiskSeverity::High,
                Some("user_1"),
            ))
            .await;
        }

        // 2 * 30 event points + 10 new-account bump
        let assessment = scorer.score("user_1").await;
        assert_eq!(assessment.score, 70);
        assert_eq!(assessment.level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_medium_tier_boundaries() {
        let (log, scorer) = scorer_with_log();

        // One medium event: 15 points, first-seen is now so +10 = 25.
        log.append(RiskEvent::new(
            RiskEventKind::PayoutRequested,
            RiskSeverity::Medium,
            Some("user_1"),
        ))
        .await;

        let assessment = scorer.score("user_1").await;
        assert_eq!(assessment.score, 25);
        assert_eq!(assessment.level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_claim_velocity_factor() {
        let (log, scorer) = scorer_with_log();

        for _ in 0..12 {
            log.append(RiskEvent::new(
                RiskEventKind::ActionClaimed,
                RiskSeverity::Low,
                Some("user_1"),
            ))
            .await;
        }

        let assessment = scorer.score("user_1").await;
        assert!(assessment.factors.iter().any(|f| f.contains("claims in")));
    }

    #[tokio::test]
    async fn test_deterministic_given_same_log_and_instant() {
        let (log, scorer) = scorer_with_log();

        log.append(RiskEvent::new(
            RiskEventKind::ActionClaimed,
            RiskSeverity::Low,
            Some("user_1"),
        ))
        .await;

        let at = Utc::now();
        let a = scorer.score_at("user_1", at).await;
        let b = scorer.score_at("user_1", at).await;

        assert_eq!(a.score, b.score);
        assert_eq!(a.factors, b.factors);
    }
}
