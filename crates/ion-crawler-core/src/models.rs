//! Core data models shared by the crawler pipeline.
//!
//! These types represent the records read from the identity feed, the
//! documents that pass the filter, the persisted dedup markers, and the
//! event envelope handed to downstream consumers.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw record exactly as the feed returned it.
///
/// Records are kept as untyped JSON until the filter parses them, so a
/// malformed record never fails a whole page.
pub type RawRecord = serde_json::Value;

/// Event type carried by every envelope this crawler emits.
pub const DID_DISCOVERED_EVENT: &str = "did-document-discovered";

/// A discovered identity document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DidDocument {
    /// Identifier assigned by the identity network (the DID suffix).
    pub id: String,
    /// Declared type tag, normalized to the accepted tag it matched.
    #[serde(rename = "type")]
    pub doc_type: String,
    /// Document content, stored verbatim.
    pub payload: serde_json::Value,
    /// First observation by this crawler, not the network publish time.
    pub observed_at: DateTime<Utc>,
}

/// Persisted dedup marker stored under `seen/{id}`.
///
/// `published` flips to true only after the publish step for the id
/// succeeded. `document` holds what Draining needs to republish; it is
/// `None` for malformed and sampled-out records, which are remembered
/// but never published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeenRecord {
    pub first_seen_at: DateTime<Utc>,
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<DidDocument>,
}

impl SeenRecord {
    /// True if this record is waiting for a successful publish.
    pub fn is_pending(&self) -> bool {
        !self.published && self.document.is_some()
    }
}

/// Opaque continuation token returned by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrawlCursor(pub String);

impl CrawlCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CrawlCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of the feed.
///
/// `next_cursor == None` means the currently available content is
/// exhausted, not that the network has no more documents.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub records: Vec<RawRecord>,
    pub next_cursor: Option<CrawlCursor>,
}

/// Immutable configuration snapshot for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlerConfig {
    pub feed_endpoint: String,
    pub accepted_types: BTreeSet<String>,
    /// Fraction of matching documents kept, in `[0.0, 1.0]`.
    pub sampling_rate: f64,
    pub page_size: usize,
    /// Maximum pages fetched by one cycle.
    pub page_budget: usize,
    pub restart_from_genesis: bool,
}

impl CrawlerConfig {
    pub fn new(feed_endpoint: impl Into<String>) -> Self {
        Self {
            feed_endpoint: feed_endpoint.into(),
            accepted_types: BTreeSet::from(["gxi".to_string()]),
            sampling_rate: 1.0,
            page_size: 100,
            page_budget: 50,
            restart_from_genesis: false,
        }
    }

    pub fn sampling_enabled(&self) -> bool {
        self.sampling_rate < 1.0
    }
}

/// Envelope published downstream for each discovered document.
///
/// `event_id` is the document id and is the idempotency key consumers
/// deduplicate on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: String,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Build the envelope for a document.
    ///
    /// `occurred_at` is the document's first observation, so publishing
    /// the same document twice yields identical envelopes.
    pub fn for_document(doc: &DidDocument) -> Self {
        Self {
            event_id: doc.id.clone(),
            event_type: DID_DISCOVERED_EVENT.to_string(),
            occurred_at: doc.observed_at,
            payload: doc.payload.clone(),
        }
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// The feed reported no next cursor.
    Completed,
    /// The per-cycle page budget ran out before the feed did.
    PageBudgetExhausted,
    /// The feed failed; progress up to the last full page is kept.
    FeedUnavailable,
    /// The feed rejected the cursor; it was cleared for a genesis restart.
    CursorReset,
    /// A shutdown signal stopped the cycle between documents or pages.
    Cancelled,
    /// Another cycle was still running.
    Skipped,
    /// The seen store failed; counts cover the work done before it.
    StoreFailed,
}

impl std::fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CycleOutcome::Completed => "completed",
            CycleOutcome::PageBudgetExhausted => "page budget exhausted",
            CycleOutcome::FeedUnavailable => "feed unavailable",
            CycleOutcome::CursorReset => "cursor reset",
            CycleOutcome::Cancelled => "cancelled",
            CycleOutcome::Skipped => "skipped",
            CycleOutcome::StoreFailed => "aborted by store failure",
        };
        f.write_str(s)
    }
}

/// Counts reported by every cycle, including ones that end early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    /// New documents that passed the filter.
    pub matched: u64,
    /// Successful publishes, from both Paging and Draining.
    pub published: u64,
    /// Publish attempts made by Draining.
    pub retried: u64,
    /// Publish attempts that failed.
    pub failed: u64,
    /// Records of other types, or not sampled.
    pub excluded: u64,
    pub malformed: u64,
    /// Matching records already seen in an earlier cycle or page.
    pub duplicates: u64,
    pub pages: u64,
    pub outcome: CycleOutcome,
}

impl CycleSummary {
    pub fn new() -> Self {
        Self {
            matched: 0,
            published: 0,
            retried: 0,
            failed: 0,
            excluded: 0,
            malformed: 0,
            duplicates: 0,
            pages: 0,
            outcome: CycleOutcome::Completed,
        }
    }

    pub fn skipped() -> Self {
        Self {
            outcome: CycleOutcome::Skipped,
            ..Self::new()
        }
    }
}

impl Default for CycleSummary {
    fn default() -> Self {
        Self::new()
    }
}
