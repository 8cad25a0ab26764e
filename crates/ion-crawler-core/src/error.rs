//! Error taxonomy for the crawl pipeline.
//!
//! Errors are scoped by how far they are allowed to travel:
//!
//! | Error | Scope | Handling |
//! |-------|-------|----------|
//! | [`FeedError::Unavailable`] | cycle | ends Paging early, retried next cycle |
//! | [`FeedError::InvalidCursor`] | cycle | cursor cleared, next cycle restarts from genesis |
//! | [`PublishError`] | document | record stays pending, healed by Draining |
//! | [`StoreError`] | process | propagates to the caller |

use thiserror::Error;

use crate::models::CycleSummary;

#[derive(Debug, Error)]
pub enum FeedError {
    /// Network or backend failure. Always retryable.
    #[error("feed unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the continuation token.
    #[error("feed rejected cursor: {0}")]
    InvalidCursor(String),
}

#[derive(Debug, Error)]
pub enum PublishError {
    /// The sink refused the event outright; retrying the same request
    /// within this attempt would not help.
    #[error("event sink rejected event: {0}")]
    Rejected(String),

    /// Transient failures outlasted the sink's retry policy.
    #[error("event sink failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// A marker operation referenced an id that was never marked seen.
    #[error("no seen record for id '{0}'")]
    NotFound(String),

    #[error("corrupt stored value under '{key}': {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("object store failure: {0}")]
    Backend(#[from] anyhow::Error),
}

/// The only error a crawl cycle returns to its caller.
///
/// Feed and publish failures are absorbed into the cycle summary; only a
/// broken store leaves the cycle in an undefined state. The counts
/// gathered before the failure travel with the error.
#[derive(Debug, Error)]
#[error("crawl cycle aborted: {source}")]
pub struct CrawlError {
    #[source]
    pub source: StoreError,
    /// Summary up to the failure, with outcome `StoreFailed`.
    pub partial: Box<CycleSummary>,
}
