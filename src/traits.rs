//! Collaborator traits for the crawl pipeline.
//!
//! The orchestrator only talks to the outside world through these two
//! seams, which makes it straightforward to swap the HTTP
//! implementations for in-memory fakes in tests.
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌────────────────┐
//! │ FeedClient   │──▶│ CrawlCycle  │──▶│ EventPublisher │
//! │ (paginated)  │   │ filter+dedup│   │ (sink + retry) │
//! └──────────────┘   └──────┬──────┘   └────────────────┘
//!                           ▼
//!                     ┌───────────┐
//!                     │ SeenStore │
//!                     └───────────┘
//! ```

use async_trait::async_trait;

use ion_crawler_core::error::{FeedError, PublishError};
use ion_crawler_core::models::{CrawlCursor, DidDocument, FeedPage};

// ═══════════════════════════════════════════════════════════════════════
// FeedClient Trait
// ═══════════════════════════════════════════════════════════════════════

/// Paginated, read-only view of the remote identity-document feed.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use ion_crawler::traits::FeedClient;
/// use ion_crawler_core::error::FeedError;
/// use ion_crawler_core::models::{CrawlCursor, FeedPage};
///
/// pub struct EmptyFeed;
///
/// #[async_trait]
/// impl FeedClient for EmptyFeed {
///     async fn fetch_page(
///         &self,
///         _cursor: Option<&CrawlCursor>,
///         _page_size: usize,
///     ) -> Result<FeedPage, FeedError> {
///         Ok(FeedPage::default())
///     }
/// }
/// ```
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Fetch the page starting at `cursor` (`None` = genesis).
    ///
    /// # Errors
    ///
    /// - [`FeedError::Unavailable`] on network or backend failure; the
    ///   caller may retry later.
    /// - [`FeedError::InvalidCursor`] if the backend rejected `cursor`.
    async fn fetch_page(
        &self,
        cursor: Option<&CrawlCursor>,
        page_size: usize,
    ) -> Result<FeedPage, FeedError>;
}

// ═══════════════════════════════════════════════════════════════════════
// EventPublisher Trait
// ═══════════════════════════════════════════════════════════════════════

/// Delivers a discovery event for a document to the external sink.
///
/// Implementations build an
/// [`EventEnvelope`](ion_crawler_core::models::EventEnvelope) keyed by the
/// document id and run their own retry policy. An `Err` means the retries
/// were exhausted or the sink refused the event.
///
/// Publishing the same document twice must produce the same `eventId`,
/// since consumers deduplicate on it.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, document: &DidDocument) -> Result<(), PublishError>;
}
