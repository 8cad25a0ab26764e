//! Periodic trigger for crawl cycles.
//!
//! Thin adapter: ticks every `crawler.interval_minutes`, builds a fresh
//! [`CrawlerConfig`](ion_crawler_core::models::CrawlerConfig) snapshot,
//! and runs one cycle to completion before waiting for the next tick.
//! Ticks missed while a long cycle runs are skipped, never queued.

use std::sync::Arc;

use anyhow::Result;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::crawl::CrawlCycle;

/// Run cycles until `shutdown` is cancelled.
///
/// A cancelled shutdown also cancels the in-flight cycle, which finishes
/// the record it is on and returns. Store failures are logged and the
/// loop waits for the next tick.
pub async fn run_scheduler(
    cycle: Arc<CrawlCycle>,
    config: &Config,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut ticker = interval(config.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        interval_minutes = config.crawler.interval_minutes,
        "started periodic crawling of the ION feed"
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let snapshot = config.crawler_config();
        match cycle.run_cycle(&snapshot, &shutdown).await {
            Ok(summary) => {
                if summary.failed > 0 {
                    info!(
                        failed = summary.failed,
                        "some documents remain unpublished; they will be retried next cycle"
                    );
                }
            }
            Err(e) => error!(
                error = %e.source,
                published = e.partial.published,
                "store failure; waiting for the next tick"
            ),
        }
    }

    info!("stopped ION crawler");
    Ok(())
}

/// Serve command: open the store, then crawl until Ctrl-C.
pub async fn run_serve(config: &Config) -> Result<()> {
    let cycle = Arc::new(CrawlCycle::from_config(config).await?);
    let shutdown = CancellationToken::new();

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested; finishing current record");
            signal.cancel();
        }
    });

    run_scheduler(cycle, config, shutdown).await
}
