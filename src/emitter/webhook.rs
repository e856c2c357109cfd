//! HTTP webhook emitter.

use super::Emitter;
use crate::models::{EmittedCount, WindowId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// JSON body posted for each window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Destination topic.
    pub topic: String,
    /// Human-readable summary.
    pub message: String,
    /// Number of distinct identifiers.
    pub count: u64,
    /// Window the count belongs to.
    pub window_id: WindowId,
    /// Configured window length in milliseconds.
    pub window_ms: u64,
    /// When the count was produced.
    pub emitted_at: DateTime<Utc>,
}

impl WebhookPayload {
    /// Builds the payload for `count` on `topic`.
    #[must_use]
    pub fn new(topic: &str, count: &EmittedCount) -> Self {
        Self {
            topic: topic.to_string(),
            message: count.message(),
            count: count.count,
            window_id: count.window_id,
            window_ms: count.window_ms,
            emitted_at: count.emitted_at,
        }
    }
}

/// Posts each count as JSON to a fixed URL.
///
/// Uses a blocking `reqwest` client; call from a blocking context. Any
/// non-2xx response is a publish failure.
pub struct WebhookEmitter {
    client: reqwest::blocking::Client,
    url: String,
    topic: String,
    token: Option<SecretString>,
}

impl WebhookEmitter {
    /// Creates an emitter posting to `url` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, topic: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(format!("tally/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| Error::OperationFailed {
                operation: "build_webhook_client".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self {
            client,
            url: url.into(),
            topic: topic.into(),
            token: None,
        })
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    #[must_use]
    pub fn with_bearer_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    /// Destination URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn publish_error(&self, cause: String) -> Error {
        Error::Publish {
            topic: self.topic.clone(),
            cause,
        }
    }
}

impl Emitter for WebhookEmitter {
    fn publish(&self, count: &EmittedCount) -> Result<()> {
        let payload = WebhookPayload::new(&self.topic, count);

        let mut request = self
            .client
            .post(&self.url)
            .header("X-Tally-Topic", &self.topic)
            .json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .map_err(|e| self.publish_error(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(url = %self.url, status = status.as_u16(), "Webhook delivered");
            Ok(())
        } else {
            Err(self.publish_error(format!("HTTP {} response", status.as_u16())))
        }
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let count = EmittedCount::new(WindowId::new(3), 12, Duration::from_secs(60));
        let payload = WebhookPayload::new("unique-counts", &count);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["topic"], "unique-counts");
        assert_eq!(json["message"], "Unique count in the last minute: 12");
        assert_eq!(json["count"], 12);
        assert_eq!(json["window_id"], 3);
        assert_eq!(json["window_ms"], 60_000);
        assert!(json["emitted_at"].is_string());
    }

    #[test]
    fn test_unreachable_endpoint_is_publish_error() {
        // Port 9 (discard) is not expected to accept HTTP on loopback.
        let emitter = WebhookEmitter::new(
            "http://127.0.0.1:9/counts",
            "unique-counts",
            Duration::from_millis(200),
        )
        .unwrap();
        let count = EmittedCount::new(WindowId::FIRST, 1, Duration::from_secs(60));

        let err = emitter.publish(&count).unwrap_err();
        assert!(matches!(err, Error::Publish { ref topic, .. } if topic == "unique-counts"));
    }
}
