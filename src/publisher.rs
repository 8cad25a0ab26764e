//! Event publisher implementations.
//!
//! - **[`HttpEventPublisher`]**: POSTs the envelope to an Event Grid style
//!   topic endpoint, with retry and backoff.
//! - **[`LogEventPublisher`]**: writes the envelope to the log; for local
//!   runs without a sink.
//!
//! Use [`create_publisher`] to pick one from the configuration.
//!
//! # Envelope
//!
//! Each request body is a JSON array holding one envelope:
//!
//! ```json
//! [{ "eventId": "EiA…", "eventType": "did-document-discovered",
//!    "occurredAt": "2024-03-01T12:00:00Z", "payload": { … } }]
//! ```
//!
//! `eventId` is the document id, so a document published twice reaches
//! consumers with the same idempotency key.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use ion_crawler_core::error::PublishError;
use ion_crawler_core::models::{DidDocument, EventEnvelope};

use crate::config::PublisherConfig;
use crate::retry::{is_transient, RetryPolicy};
use crate::traits::EventPublisher;

/// Header carrying the topic access key.
const SINK_KEY_HEADER: &str = "aeg-sas-key";

/// Build the publisher selected by `publisher.kind`.
///
/// # Errors
///
/// Fails if `kind = "http"` lacks an endpoint, or if `key_env` names an
/// unset environment variable.
pub fn create_publisher(config: &PublisherConfig) -> Result<Arc<dyn EventPublisher>> {
    match config.kind.as_str() {
        "http" => Ok(Arc::new(HttpEventPublisher::new(config)?)),
        "log" => Ok(Arc::new(LogEventPublisher)),
        other => bail!("Unknown publisher kind: {}", other),
    }
}

// ============ HTTP Publisher ============

/// Publishes envelopes to an HTTP event topic.
pub struct HttpEventPublisher {
    client: reqwest::Client,
    endpoint: String,
    access_key: Option<String>,
    retry: RetryPolicy,
}

impl HttpEventPublisher {
    pub fn new(config: &PublisherConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("publisher.endpoint required for http publisher"))?;

        let access_key = match &config.key_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                anyhow::anyhow!("{} environment variable not set (publisher.key_env)", var)
            })?),
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            access_key,
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl EventPublisher for HttpEventPublisher {
    async fn publish(&self, document: &DidDocument) -> Result<(), PublishError> {
        let body = serde_json::to_vec(&[EventEnvelope::for_document(document)])?;

        let mut last_err = String::new();

        for attempt in 0..self.retry.attempts() {
            if attempt > 0 {
                tokio::time::sleep(self.retry.delay_for(attempt)).await;
            }

            let mut request = self
                .client
                .post(&self.endpoint)
                .header("Content-Type", "application/json")
                .body(body.clone());
            if let Some(key) = &self.access_key {
                request = request.header(SINK_KEY_HEADER, key);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        debug!(did = %document.id, attempt, "event delivered");
                        return Ok(());
                    }

                    let body_text = response.text().await.unwrap_or_default();

                    if is_transient(status) {
                        last_err = format!("event sink error {}: {}", status, body_text);
                        continue;
                    }

                    return Err(PublishError::Rejected(format!(
                        "event sink error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = format!("request to {} failed: {}", self.endpoint, e);
                    continue;
                }
            }
        }

        Err(PublishError::Exhausted {
            attempts: self.retry.attempts(),
            last: last_err,
        })
    }
}

// ============ Log Publisher ============

/// Emits each envelope as an info event instead of sending it anywhere.
pub struct LogEventPublisher;

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish(&self, document: &DidDocument) -> Result<(), PublishError> {
        let envelope = serde_json::to_string(&EventEnvelope::for_document(document))?;
        info!(did = %document.id, event = %envelope, "discovered DID document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_kind_requires_endpoint() {
        let cfg = PublisherConfig {
            kind: "http".to_string(),
            ..PublisherConfig::default()
        };
        assert!(create_publisher(&cfg).is_err());
    }

    #[test]
    fn missing_key_env_fails_fast() {
        let cfg = PublisherConfig {
            kind: "http".to_string(),
            endpoint: Some("http://sink.local/api/events".to_string()),
            key_env: Some("ION_CRAWLER_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
            ..PublisherConfig::default()
        };
        let err = create_publisher(&cfg).err().unwrap();
        assert!(err.to_string().contains("ION_CRAWLER_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[tokio::test]
    async fn log_publisher_always_succeeds() {
        let doc = DidDocument {
            id: "EiA".to_string(),
            doc_type: "gxi".to_string(),
            payload: serde_json::json!({}),
            observed_at: chrono::Utc::now(),
        };
        LogEventPublisher.publish(&doc).await.unwrap();
    }
}
