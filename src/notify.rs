//! Notification Dispatch
//!
//! Best-effort user notifications after a reward or payout status
//! change. Dispatch is spawned after the state transition commits and
//! never blocks or fails it; delivery errors are logged and dropped.

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct NotificationPayload<'a> {
    user_id: &'a str,
    message: &'a str,
}

pub struct NotificationSender {
    client: Client,
    webhook_url: Option<String>,
}

impl NotificationSender {
    pub fn new(webhook_url: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Questline/0.1")
            .build()
            .unwrap_or_default();

        Self {
            client,
            webhook_url,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Queue a notification. Returns immediately; the send happens on a
    /// spawned task.
    pub fn notify(&self, user_id: &str, message: &str) {
        let Some(url) = self.webhook_url.clone() else {
            debug!(user_id = %user_id, message = %message, "Notification sink disabled, dropping");
            return;
        };

        let client = self.client.clone();
        let user_id = user_id.to_string();
        let message = message.to_string();

        tokio::spawn(async move {
            let payload = NotificationPayload {
                user_id: &user_id,
                message: &message,
            };
            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(user_id = %user_id, "Notification delivered");
                }
                Ok(response) => {
                    warn!(
                        user_id = %user_id,
                        status = %response.status(),
                        "Notification sink rejected the message"
                    );
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "Notification send failed");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_sender_drops_without_panicking() {
        let sender = NotificationSender::disabled();
        sender.notify("user_1", "Reward issued");
    }
}
