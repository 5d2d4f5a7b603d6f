use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

use crate::payout::PayoutPolicy;
use crate::risk::RiskPolicy;

/// Configuration for the settlement service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Payout policy
    pub payout: PayoutConfig,
    /// Risk scoring configuration
    pub risk: RiskConfig,
    /// Verification oracle configuration
    pub oracle: OracleConfig,
    /// Notification sink configuration
    pub notifier: NotifierConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub postgres_url: String,
    /// Enable PostgreSQL (if false, state is in-memory only)
    pub postgres_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutConfig {
    /// Smallest amount a user may withdraw
    pub min_amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Scores above this are medium risk
    pub medium_threshold: i32,
    /// Scores above this are high risk
    pub high_threshold: i32,
    /// Events older than this contribute at half weight
    pub half_life_days: i64,
    /// Events older than this are ignored
    pub stale_days: i64,
    /// Accounts first seen within this window get a score bump
    pub new_account_days: i64,
    pub new_account_bump: i32,
    /// Claim-velocity window and ceiling
    pub velocity_window_minutes: i64,
    pub velocity_max_claims: usize,
    pub velocity_bump: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Verification oracle base URL
    pub base_url: String,
    /// Oracle API key
    pub api_key: String,
    /// Oracle timeout in seconds
    pub timeout_secs: u64,
    /// Require HTTPS for oracle calls
    pub require_https: bool,
    /// Disable to run without an oracle (auto-verifiable quests then
    /// wait for retry or review)
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Webhook receiving user notifications; unset disables sending
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug)
    pub level: String,
    /// Enable request/response logging spans
    pub log_requests: bool,
}

impl Default for RiskConfig {
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

impl RiskConfig {
    /// Convert to the policy consumed by the scorer and the engine
    pub fn to_policy(&self) -> RiskPolicy {
        RiskPolicy {
            medium_threshold: self.medium_threshold,
            high_threshold: self.high_threshold,
            half_life_days: self.half_life_days,
            stale_days: self.stale_days,
            new_account_days: self.new_account_days,
            new_account_bump: self.new_account_bump,
            velocity_window_minutes: self.velocity_window_minutes,
            velocity_max_claims: self.velocity_max_claims,
            velocity_bump: self.velocity_bump,
        }
    }
}

impl PayoutConfig {
    pub fn to_policy(&self) -> PayoutPolicy {
        PayoutPolicy {
            min_amount: self.min_amount,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8470,
            },
            database: DatabaseConfig {
                postgres_url: "postgresql://localhost:5432/questline".to_string(),
                postgres_enabled: false,
            },
            payout: PayoutConfig { min_amount: 1 },
            risk: RiskConfig::default(),
            oracle: OracleConfig {
                base_url: "https://oracle.questline.example".to_string(),
                api_key: String::new(), // Must be configured when enabled
                timeout_secs: 30,
                require_https: true,
                enabled: false,
            },
            notifier: NotifierConfig { webhook_url: None },
            logging: LoggingConfig {
                level: "info".to_string(),
                log_requests: false,
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Server configuration
        if let Ok(host) = env::var("QUESTLINE_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = env::var("QUESTLINE_PORT") {
            config.server.port = port.parse().context("Invalid QUESTLINE_PORT value")?;
        }

        // Database configuration
        if let Ok(url) = env::var("QUESTLINE_POSTGRES_URL") {
            config.database.postgres_url = url;
        }

        if let Ok(enabled) = env::var("QUESTLINE_POSTGRES_ENABLED") {
            config.database.postgres_enabled = enabled
                .parse()
                .context("Invalid QUESTLINE_POSTGRES_ENABLED value")?;
        }

        // Payout configuration
        if let Ok(min) = env::var("QUESTLINE_PAYOUT_MIN_AMOUNT") {
            config.payout.min_amount = min
                .parse()
                .context("Invalid QUESTLINE_PAYOUT_MIN_AMOUNT value")?;
        }

        // Risk configuration
        if let Ok(threshold) = env::var("QUESTLINE_RISK_MEDIUM_THRESHOLD") {
            config.risk.medium_threshold = threshold
                .parse()
                .context("Invalid QUESTLINE_RISK_MEDIUM_THRESHOLD value")?;
        }

        if let Ok(threshold) = env::var("QUESTLINE_RISK_HIGH_THRESHOLD") {
            config.risk.high_threshold = threshold
                .parse()
                .context("Invalid QUESTLINE_RISK_HIGH_THRESHOLD value")?;
        }

        if let Ok(days) = env::var("QUESTLINE_RISK_STALE_DAYS") {
            config.risk.stale_days = days
                .parse()
                .context("Invalid QUESTLINE_RISK_STALE_DAYS value")?;
        }

        if let Ok(max) = env::var("QUESTLINE_RISK_VELOCITY_MAX_CLAIMS") {
            config.risk.velocity_max_claims = max
                .parse()
                .context("Invalid QUESTLINE_RISK_VELOCITY_MAX_CLAIMS value")?;
        }

        // Oracle configuration
        if let Ok(enabled) = env::var("QUESTLINE_ORACLE_ENABLED") {
            config.oracle.enabled = enabled
                .parse()
                .context("Invalid QUESTLINE_ORACLE_ENABLED value")?;
        }

        if let Ok(url) = env::var("QUESTLINE_ORACLE_URL") {
            if config.oracle.require_https && !url.starts_with("https://") {
                return Err(anyhow::anyhow!(
                    "HTTPS is required but oracle URL is not HTTPS: {}",
                    url
                ));
            }
            config.oracle.base_url = url;
        }

        if config.oracle.enabled {
            config.oracle.api_key = env::var("QUESTLINE_ORACLE_API_KEY")
                .context("QUESTLINE_ORACLE_API_KEY is required when the oracle is enabled")?;
        }

        if let Ok(timeout) = env::var("QUESTLINE_ORACLE_TIMEOUT_SECS") {
            config.oracle.timeout_secs = timeout
                .parse()
                .context("Invalid QUESTLINE_ORACLE_TIMEOUT_SECS value")?;
        }

        // Notifier configuration
        if let Ok(url) = env::var("QUESTLINE_NOTIFY_WEBHOOK_URL") {
            if !url.is_empty() {
                config.notifier.webhook_url = Some(url);
            }
        }

        // Logging configuration
        if let Ok(level) = env::var("QUESTLINE_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Ok(log_requests) = env::var("QUESTLINE_LOG_REQUESTS") {
            config.logging.log_requests = log_requests
                .parse()
                .context("Invalid QUESTLINE_LOG_REQUESTS value")?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_usable() {
        let config = Config::default();
        assert!(!config.database.postgres_enabled);
        assert!(!config.oracle.enabled);
        assert_eq!(config.risk.medium_threshold, 20);
        assert_eq!(config.risk.high_threshold, 50);
        assert_eq!(config.payout.min_amount, 1);
    }

    #[test]
    fn test_policy_conversion_carries_thresholds() {
        let config = Config::default();
        let policy = config.risk.to_policy();
        assert_eq!(policy.medium_threshold, config.risk.medium_threshold);
        assert_eq!(policy.velocity_max_claims, config.risk.velocity_max_claims);
    }
}
