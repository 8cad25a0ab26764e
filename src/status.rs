//! Crawl state overview and explicit reset.
//!
//! `ion-crawler status` shows where the next cycle will resume and how
//! many documents are still waiting to be published.
//! `ion-crawler reset` forgets the dedup markers (or only the cursor),
//! which is the one supported way to make the crawler revisit documents.

use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use ion_crawler_core::seen::SeenStore;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteObjectStore;

async fn open_seen_store(config: &Config) -> Result<SeenStore> {
    let pool = db::connect(config).await?;
    migrate::create_schema(&pool).await?;
    Ok(SeenStore::new(Arc::new(SqliteObjectStore::new(pool))))
}

pub async fn run_status(config: &Config) -> Result<()> {
    let seen = open_seen_store(config).await?;
    let cursor = seen.get_cursor().await?;
    let stats = seen.stats().await?;

    println!("ION Crawler Status");
    println!("==================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Feed:        {}", config.feed.endpoint);
    println!(
        "  Cursor:      {}",
        cursor
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "(genesis)".to_string())
    );
    println!();
    println!("  Seen:        {}", stats.seen);
    println!("  Published:   {}", stats.published);
    println!("  Pending:     {}", stats.pending);
    println!("  Skipped:     {}", stats.rejected);
    Ok(())
}

pub async fn run_reset(config: &Config, cursor_only: bool) -> Result<()> {
    let seen = open_seen_store(config).await?;

    if cursor_only {
        let cleared = seen.clear_cursor().await?;
        warn!(cleared, "cursor reset; next cycle starts from genesis");
        println!("cursor cleared: {}", cleared);
    } else {
        let removed = seen.reset().await?;
        warn!(removed, "seen store reset; previously published documents will be republished");
        println!("removed {} seen records and the cursor", removed);
    }
    println!("ok");
    Ok(())
}
