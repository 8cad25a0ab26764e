//! ION feed connector.
//!
//! Reads the operations feed of an ION node page by page over HTTP.
//!
//! # Configuration
//!
//! ```toml
//! [feed]
//! endpoint = "http://23.97.144.59:3000/"
//! page_size = 100
//! timeout_secs = 30
//! max_retries = 3
//! ```
//!
//! # Wire format
//!
//! `GET {endpoint}/operations?limit={page_size}&cursor={cursor}` returns
//!
//! ```json
//! { "operations": [ { "didSuffix": "EiA…", "type": "Z3hp", "document": { … } } ],
//!   "cursor": "next-token" }
//! ```
//!
//! A missing, `null`, or empty `cursor` means the currently available
//! content is exhausted. Records are passed through untouched; the
//! [`filter`](ion_crawler_core::filter) decides what they mean.
//!
//! # Pagination
//!
//! The feed is treated as append-only at the tail. Documents inserted
//! behind an already-persisted cursor are not revisited.
//!
//! # Errors
//!
//! | Response | Result |
//! |----------|--------|
//! | 410 Gone, or 400 while a cursor was sent | [`FeedError::InvalidCursor`] |
//! | network error, 429, 5xx | retried with backoff, then [`FeedError::Unavailable`] |
//! | other 4xx, unparseable body | [`FeedError::Unavailable`] |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use ion_crawler_core::error::FeedError;
use ion_crawler_core::models::{CrawlCursor, FeedPage};

use crate::config::FeedConfig;
use crate::retry::{is_transient, RetryPolicy};
use crate::traits::FeedClient;

/// HTTP implementation of [`FeedClient`].
pub struct HttpFeedClient {
    client: reqwest::Client,
    operations_url: String,
    retry: RetryPolicy,
}

impl HttpFeedClient {
    pub fn new(config: &FeedConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            operations_url: operations_url(&config.endpoint),
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

fn operations_url(endpoint: &str) -> String {
    format!("{}/operations", endpoint.trim_end_matches('/'))
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch_page(
        &self,
        cursor: Option<&CrawlCursor>,
        page_size: usize,
    ) -> Result<FeedPage, FeedError> {
        let mut query: Vec<(&str, String)> = vec![("limit", page_size.to_string())];
        if let Some(c) = cursor {
            query.push(("cursor", c.as_str().to_string()));
        }

        let mut last_err = None;

        for attempt in 0..self.retry.attempts() {
            if attempt > 0 {
                tokio::time::sleep(self.retry.delay_for(attempt)).await;
            }

            let resp = self
                .client
                .get(&self.operations_url)
                .query(&query)
                .send()
                .await;

            let response = match resp {
                Ok(r) => r,
                Err(e) => {
                    debug!(attempt, error = %e, "feed request failed");
                    last_err = Some(format!("request to {} failed: {}", self.operations_url, e));
                    continue;
                }
            };

            let status = response.status();

            if status.is_success() {
                let body: serde_json::Value = response
                    .json()
                    .await
                    .map_err(|e| FeedError::Unavailable(format!("invalid feed response: {}", e)))?;
                return parse_feed_response(body);
            }

            let body_text = response.text().await.unwrap_or_default();

            if status == StatusCode::GONE || (status == StatusCode::BAD_REQUEST && cursor.is_some())
            {
                return Err(FeedError::InvalidCursor(format!(
                    "{} rejected cursor {}: {}",
                    status,
                    cursor.map(CrawlCursor::as_str).unwrap_or("<none>"),
                    body_text
                )));
            }

            if is_transient(status) {
                debug!(attempt, %status, "feed returned transient error");
                last_err = Some(format!("feed error {}: {}", status, body_text));
                continue;
            }

            return Err(FeedError::Unavailable(format!(
                "feed error {}: {}",
                status, body_text
            )));
        }

        let reason = last_err.unwrap_or_else(|| "feed request failed".to_string());
        warn!(attempts = self.retry.attempts(), %reason, "feed retries exhausted");
        Err(FeedError::Unavailable(reason))
    }
}

/// Parse the `operations` page body.
fn parse_feed_response(body: serde_json::Value) -> Result<FeedPage, FeedError> {
    let serde_json::Value::Object(mut fields) = body else {
        return Err(FeedError::Unavailable(
            "invalid feed response: expected object".to_string(),
        ));
    };

    let records = match fields.remove("operations") {
        Some(serde_json::Value::Array(items)) => items,
        _ => {
            return Err(FeedError::Unavailable(
                "invalid feed response: missing operations array".to_string(),
            ))
        }
    };

    let next_cursor = match fields.remove("cursor") {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(CrawlCursor(s)),
        Some(serde_json::Value::String(_)) | Some(serde_json::Value::Null) | None => None,
        Some(other) => {
            return Err(FeedError::Unavailable(format!(
                "invalid feed response: cursor must be a string, got {}",
                other
            )))
        }
    };

    Ok(FeedPage {
        records,
        next_cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_page_with_cursor() {
        let page = parse_feed_response(json!({
            "operations": [{"didSuffix": "A", "type": "Z3hp"}, "garbage"],
            "cursor": "p2"
        }))
        .unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.next_cursor, Some(CrawlCursor::new("p2")));
    }

    #[test]
    fn null_or_empty_cursor_ends_feed() {
        for cursor in [json!(null), json!("")] {
            let page = parse_feed_response(json!({"operations": [], "cursor": cursor})).unwrap();
            assert!(page.next_cursor.is_none());
        }
        let page = parse_feed_response(json!({"operations": []})).unwrap();
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn missing_operations_is_unavailable() {
        assert!(matches!(
            parse_feed_response(json!({"cursor": "x"})),
            Err(FeedError::Unavailable(_))
        ));
        assert!(matches!(
            parse_feed_response(json!([1, 2])),
            Err(FeedError::Unavailable(_))
        ));
        assert!(matches!(
            parse_feed_response(json!({"operations": [], "cursor": 5})),
            Err(FeedError::Unavailable(_))
        ));
    }

    #[test]
    fn operations_url_trims_slash() {
        assert_eq!(operations_url("http://ion:3000/"), "http://ion:3000/operations");
        assert_eq!(operations_url("http://ion:3000"), "http://ion:3000/operations");
    }
}
