//! Failure notifications
//!
//! Failures are posted to a Mattermost-compatible incoming webhook. Delivery is best
//! effort: a notification that cannot be sent is logged and the original failure is
//! what the caller sees.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Serialize;
use tracing::{debug, error};

use crate::error::{Error, Result};

/// Username shown on posted messages
pub const NOTIFIER_USERNAME: &str = "thanos-store-discovery";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Destination for failure messages
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Deliver one message
    async fn notify(&self, message: &str) -> Result<()>;
}

/// Incoming webhook payload
#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    username: &'a str,
    text: &'a str,
}

/// Posts messages to an incoming webhook
pub struct WebhookNotifier {
    http_client: HttpClient,
    url: String,
}

impl fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The webhook URL embeds its secret
        f.debug_struct("WebhookNotifier").field("url", &"********").finish()
    }
}

impl WebhookNotifier {
    /// Create a notifier for the given webhook URL
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Create a notifier with a custom request timeout
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Notification(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client, url: url.into() })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        let payload = WebhookMessage { username: NOTIFIER_USERNAME, text: message };

        let response = self
            .http_client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Notification(format!("Failed to send webhook: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Notification(format!(
                "Webhook returned {}: {}",
                status,
                body.trim()
            )));
        }

        debug!(status = %status, "Failure notification delivered");
        Ok(())
    }
}

/// Format the message posted for a failed stage
pub fn failure_message(stage: &str, error: &dyn std::error::Error) -> String {
    format!("{}: {}", stage, error)
}

/// Log a top-level failure and forward it to the notifier
///
/// A notifier error is logged and otherwise swallowed.
pub async fn report_failure(notifier: &dyn Notifier, stage: &str, error: &Error) {
    error!(stage = %stage, kind = error.kind(), error = %error, "{}", stage);

    if let Err(e) = notifier.notify(&failure_message(stage, error)).await {
        error!(error = %e, "Failed to send failure notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message() {
        let err = Error::Config("required environment variables are not set: X".to_string());
        assert_eq!(
            failure_message("Environment variable validation failed", &err),
            "Environment variable validation failed: Configuration error: required environment \
             variables are not set: X"
        );
    }

    #[test]
    fn test_debug_hides_url() {
        let notifier = WebhookNotifier::new("https://chat.example.com/hooks/secret").unwrap();
        assert!(!format!("{:?}", notifier).contains("secret"));
    }

    #[test]
    fn test_payload_shape() {
        let payload = WebhookMessage { username: NOTIFIER_USERNAME, text: "boom" };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["username"], "thanos-store-discovery");
        assert_eq!(json["text"], "boom");
    }
}
