//! Crawl cycle orchestration.
//!
//! One cycle walks the states
//!
//! ```text
//! Idle → Draining → Resuming → Paging → Idle
//! ```
//!
//! - **Draining** republishes every document that was marked seen but
//!   never confirmed published (crash or sink failure in an earlier
//!   cycle).
//! - **Resuming** loads the persisted cursor, or clears it once per
//!   process when the configuration asks for a genesis restart.
//! - **Paging** fetches pages, filters each record, skips ids already
//!   seen, and runs `mark_seen → publish → mark_published` for new
//!   matches. The cursor is persisted only after every record of its
//!   page has been handled.
//!
//! Feed failures end the cycle early with whatever progress was
//! committed. Publish failures stay document-scoped. Store failures are
//! the only errors returned to the caller, carrying the partial summary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ion_crawler_core::error::{CrawlError, FeedError, StoreError};
use ion_crawler_core::filter::{DocumentFilter, FilterOutcome};
use ion_crawler_core::models::{CrawlerConfig, CycleOutcome, CycleSummary, FeedPage, RawRecord};
use ion_crawler_core::seen::SeenStore;

use crate::config::Config;
use crate::connector_ion::HttpFeedClient;
use crate::db;
use crate::migrate;
use crate::publisher::create_publisher;
use crate::sqlite_store::SqliteObjectStore;
use crate::traits::{EventPublisher, FeedClient};

/// The crawl orchestrator.
///
/// Holds no state between cycles besides the injected collaborators, a
/// re-entrancy flag, and whether the genesis restart already happened.
/// A call to [`run_cycle`](CrawlCycle::run_cycle) while another is in
/// progress returns immediately with [`CycleOutcome::Skipped`].
pub struct CrawlCycle {
    feed: Arc<dyn FeedClient>,
    seen: SeenStore,
    publisher: Arc<dyn EventPublisher>,
    running: AtomicBool,
    genesis_applied: AtomicBool,
}

/// Clears the running flag when the cycle returns, including on error.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl CrawlCycle {
    pub fn new(
        feed: Arc<dyn FeedClient>,
        seen: SeenStore,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            feed,
            seen,
            publisher,
            running: AtomicBool::new(false),
            genesis_applied: AtomicBool::new(false),
        }
    }

    /// Wire the production collaborators: SQLite object store, HTTP feed,
    /// and the configured publisher.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::create_schema(&pool).await?;
        let store = Arc::new(SqliteObjectStore::new(pool));
        let feed = Arc::new(HttpFeedClient::new(&config.feed)?);
        let publisher = create_publisher(&config.publisher)?;
        Ok(Self::new(feed, SeenStore::new(store), publisher))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one full cycle.
    ///
    /// A summary is returned for every cycle, including cycles cut short
    /// by the feed or by `cancel`.
    ///
    /// # Errors
    ///
    /// Only a store failure; the store state is unknown afterwards. The
    /// error carries the summary of the work done before it.
    pub async fn run_cycle(
        &self,
        config: &CrawlerConfig,
        cancel: &CancellationToken,
    ) -> Result<CycleSummary, CrawlError> {
        let mut rng = StdRng::from_entropy();
        self.run_cycle_with_rng(config, cancel, &mut rng).await
    }

    /// [`run_cycle`](CrawlCycle::run_cycle) with a caller-supplied
    /// sampling source.
    pub async fn run_cycle_with_rng<R: Rng + Send + ?Sized>(
        &self,
        config: &CrawlerConfig,
        cancel: &CancellationToken,
        rng: &mut R,
    ) -> Result<CycleSummary, CrawlError> {
        let Some(_guard) = RunningGuard::acquire(&self.running) else {
            warn!("previous crawl cycle still running; skipping this one");
            return Ok(CycleSummary::skipped());
        };

        info!(
            endpoint = %config.feed_endpoint,
            page_size = config.page_size,
            page_budget = config.page_budget,
            sampling = config.sampling_enabled(),
            "crawl cycle started"
        );

        let mut summary = CycleSummary::new();

        if let Err(source) = self.run_phases(config, &mut summary, cancel, rng).await {
            summary.outcome = CycleOutcome::StoreFailed;
            error!(
                error = %source,
                matched = summary.matched,
                published = summary.published,
                retried = summary.retried,
                failed = summary.failed,
                pages = summary.pages,
                "crawl cycle aborted by store failure"
            );
            return Err(CrawlError {
                source,
                partial: Box::new(summary),
            });
        }

        info!(
            matched = summary.matched,
            published = summary.published,
            retried = summary.retried,
            failed = summary.failed,
            excluded = summary.excluded,
            malformed = summary.malformed,
            duplicates = summary.duplicates,
            pages = summary.pages,
            outcome = %summary.outcome,
            "crawl cycle finished"
        );
        Ok(summary)
    }

    async fn run_phases<R: Rng + Send + ?Sized>(
        &self,
        config: &CrawlerConfig,
        summary: &mut CycleSummary,
        cancel: &CancellationToken,
        rng: &mut R,
    ) -> Result<(), StoreError> {
        self.drain(summary, cancel).await?;

        summary.outcome = if cancel.is_cancelled() {
            CycleOutcome::Cancelled
        } else {
            self.page(config, summary, cancel, rng).await?
        };
        Ok(())
    }

    /// Retry publishing for every seen-but-unpublished document.
    async fn drain(
        &self,
        summary: &mut CycleSummary,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        let pending = self.seen.pending_publish().await?;
        if pending.is_empty() {
            return Ok(());
        }
        info!(pending = pending.len(), "draining unpublished documents");

        for id in pending {
            if cancel.is_cancelled() {
                break;
            }

            let Some(record) = self.seen.get(&id).await? else {
                continue;
            };
            let Some(document) = record.document else {
                continue;
            };
            if record.published {
                continue;
            }

            summary.retried += 1;
            match self.publisher.publish(&document).await {
                Ok(()) => {
                    self.seen.mark_published(&id).await?;
                    summary.published += 1;
                    debug!(did = %id, "pending document published");
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(did = %id, error = %e, "retry publish failed; still pending");
                }
            }
        }

        Ok(())
    }

    /// Resume from the persisted cursor and walk pages until the feed,
    /// the page budget, or the cancel signal stops us.
    async fn page<R: Rng + Send + ?Sized>(
        &self,
        config: &CrawlerConfig,
        summary: &mut CycleSummary,
        cancel: &CancellationToken,
        rng: &mut R,
    ) -> Result<CycleOutcome, StoreError> {
        // Once per process; later cycles resume from the new cursor.
        if config.restart_from_genesis && !self.genesis_applied.load(Ordering::Acquire) {
            if self.seen.clear_cursor().await? {
                info!("restart_from_genesis set; persisted cursor cleared");
            }
            self.genesis_applied.store(true, Ordering::Release);
        }

        let filter = DocumentFilter::from_config(config);
        let mut cursor = self.seen.get_cursor().await?;
        debug!(cursor = ?cursor, "resuming feed traversal");

        loop {
            if summary.pages as usize >= config.page_budget {
                info!(pages = summary.pages, "page budget exhausted; resuming next cycle");
                return Ok(CycleOutcome::PageBudgetExhausted);
            }

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(CycleOutcome::Cancelled),
                r = self.feed.fetch_page(cursor.as_ref(), config.page_size) => r,
            };

            let page = match fetched {
                Ok(page) => page,
                Err(FeedError::Unavailable(reason)) => {
                    warn!(%reason, pages = summary.pages, "feed unavailable; ending cycle early");
                    return Ok(CycleOutcome::FeedUnavailable);
                }
                Err(FeedError::InvalidCursor(reason)) => {
                    warn!(
                        cursor = ?cursor,
                        %reason,
                        "feed rejected cursor; traversal restarts from genesis next cycle, \
                         documents published meanwhile may be revisited or missed"
                    );
                    self.seen.clear_cursor().await?;
                    return Ok(CycleOutcome::CursorReset);
                }
            };
            summary.pages += 1;

            if !self.process_page(&page, &filter, summary, cancel, rng).await? {
                info!(pages = summary.pages, "crawl cancelled mid-page; cursor not advanced");
                return Ok(CycleOutcome::Cancelled);
            }

            match page.next_cursor {
                Some(next) => {
                    self.seen.set_cursor(&next).await?;
                    debug!(cursor = %next, "cursor committed");
                    cursor = Some(next);
                }
                // Keep the cursor of the tail page; the next cycle re-reads
                // it and dedup skips what was already handled.
                None => return Ok(CycleOutcome::Completed),
            }
        }
    }

    /// Handle every record of a page. Returns `false` if cancelled before
    /// the page was finished.
    async fn process_page<R: Rng + Send + ?Sized>(
        &self,
        page: &FeedPage,
        filter: &DocumentFilter,
        summary: &mut CycleSummary,
        cancel: &CancellationToken,
        rng: &mut R,
    ) -> Result<bool, StoreError> {
        for record in &page.records {
            if cancel.is_cancelled() {
                return Ok(false);
            }
            self.process_record(record, filter, summary, rng).await?;
        }
        Ok(true)
    }

    async fn process_record<R: Rng + Send + ?Sized>(
        &self,
        record: &RawRecord,
        filter: &DocumentFilter,
        summary: &mut CycleSummary,
        rng: &mut R,
    ) -> Result<(), StoreError> {
        let now = Utc::now();

        let document = match filter.matches(record, now, rng) {
            FilterOutcome::Matched(doc) => doc,
            FilterOutcome::Excluded => {
                summary.excluded += 1;
                return Ok(());
            }
            // Remembered so a re-read of the page does not draw again.
            FilterOutcome::SampledOut { id } => {
                if self.seen.mark_seen(&id, now, None).await? {
                    summary.excluded += 1;
                } else {
                    summary.duplicates += 1;
                }
                return Ok(());
            }
            FilterOutcome::Malformed { id: Some(id) } => {
                summary.malformed += 1;
                if self.seen.mark_seen(&id, now, None).await? {
                    debug!(did = %id, "malformed record marked seen");
                }
                return Ok(());
            }
            FilterOutcome::Malformed { id: None } => {
                summary.malformed += 1;
                warn!("skipping feed record without an id");
                return Ok(());
            }
        };

        if self.seen.has(&document.id).await? {
            summary.duplicates += 1;
            return Ok(());
        }
        if !self
            .seen
            .mark_seen(&document.id, document.observed_at, Some(&document))
            .await?
        {
            summary.duplicates += 1;
            return Ok(());
        }
        summary.matched += 1;

        match self.publisher.publish(&document).await {
            Ok(()) => {
                self.seen.mark_published(&document.id).await?;
                summary.published += 1;
            }
            Err(e) => {
                summary.failed += 1;
                warn!(did = %document.id, error = %e, "publish failed; left pending for the next drain");
            }
        }

        Ok(())
    }
}

/// Run a single cycle from the CLI and print its summary.
///
/// A store failure still prints the partial summary before the error is
/// returned.
pub async fn run_crawl(config: &Config) -> Result<()> {
    let cycle = CrawlCycle::from_config(config).await?;
    let cancel = CancellationToken::new();

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    match cycle.run_cycle(&config.crawler_config(), &cancel).await {
        Ok(summary) => {
            print_summary(&summary);
            println!("ok");
            Ok(())
        }
        Err(e) => {
            print_summary(&e.partial);
            Err(e.into())
        }
    }
}

pub fn print_summary(summary: &CycleSummary) {
    println!("crawl {}", summary.outcome);
    println!("  pages: {}", summary.pages);
    println!("  matched: {}", summary.matched);
    println!("  published: {}", summary.published);
    println!("  retried: {}", summary.retried);
    println!("  failed: {}", summary.failed);
    println!("  excluded: {}", summary.excluded);
    println!("  malformed: {}", summary.malformed);
    println!("  duplicates: {}", summary.duplicates);
}
