//! Durable record of documents the crawler has already examined.
//!
//! [`SeenStore`] lays the crawl state onto an [`ObjectStore`] in two
//! partitions:
//!
//! ```text
//! seen/{id}  ->  SeenRecord { first_seen_at, published, document }
//! cursor     ->  CrawlCursor
//! ```
//!
//! The marker is two-phase. `mark_seen` creates it with
//! `published = false` before anything is sent downstream, and
//! `mark_published` flips it only after the sink confirmed delivery. A
//! crash in between leaves the id in [`SeenStore::pending_publish`],
//! which the next cycle drains.
//!
//! The store assumes a single writer. Running two crawler processes
//! against the same backend is not supported.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StoreError;
use crate::models::{CrawlCursor, DidDocument, SeenRecord};
use crate::store::ObjectStore;

const SEEN_PREFIX: &str = "seen/";
const CURSOR_KEY: &str = "cursor";

/// Aggregate counts over the `seen/` partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeenStats {
    pub seen: u64,
    pub published: u64,
    pub pending: u64,
    /// Records remembered without a document (malformed or sampled out).
    pub rejected: u64,
}

/// Two-phase dedup markers and the feed cursor.
#[derive(Clone)]
pub struct SeenStore {
    store: Arc<dyn ObjectStore>,
}

fn seen_key(id: &str) -> String {
    format!("{}{}", SEEN_PREFIX, id)
}

fn decode<T: serde::de::DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|source| StoreError::Codec {
        key: key.to_string(),
        source,
    })
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|source| StoreError::Codec {
        key: key.to_string(),
        source,
    })
}

impl SeenStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// True iff a marker exists for `id`, published or not.
    pub async fn has(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.store.get(&seen_key(id)).await?.is_some())
    }

    pub async fn get(&self, id: &str) -> Result<Option<SeenRecord>, StoreError> {
        let key = seen_key(id);
        match self.store.get(&key).await? {
            Some(bytes) => Ok(Some(decode(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Create an unpublished marker for `id` unless one already exists.
    ///
    /// `document` is what Draining republishes; pass `None` for records
    /// that must be remembered but never published. Returns `true` if a
    /// marker was created. An existing marker is left untouched.
    pub async fn mark_seen(
        &self,
        id: &str,
        seen_at: DateTime<Utc>,
        document: Option<&DidDocument>,
    ) -> Result<bool, StoreError> {
        let key = seen_key(id);
        let record = SeenRecord {
            first_seen_at: seen_at,
            published: false,
            document: document.cloned(),
        };
        let bytes = encode(&key, &record)?;
        Ok(self.store.put_if_absent(&key, &bytes).await?)
    }

    /// Flip the marker for `id` to published.
    ///
    /// Fails with [`StoreError::NotFound`] if `id` was never marked seen.
    pub async fn mark_published(&self, id: &str) -> Result<(), StoreError> {
        let key = seen_key(id);
        let mut record: SeenRecord = match self.store.get(&key).await? {
            Some(bytes) => decode(&key, &bytes)?,
            None => return Err(StoreError::NotFound(id.to_string())),
        };
        if record.published {
            return Ok(());
        }
        record.published = true;
        let bytes = encode(&key, &record)?;
        self.store.put(&key, &bytes).await?;
        Ok(())
    }

    /// Ids seen but not yet confirmed published, ordered by id.
    ///
    /// Taken from a snapshot at call time. Malformed-record markers carry
    /// no document and are never returned.
    pub async fn pending_publish(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for (key, bytes) in self.store.scan_prefix(SEEN_PREFIX).await? {
            let record: SeenRecord = decode(&key, &bytes)?;
            if record.is_pending() {
                ids.push(key[SEEN_PREFIX.len()..].to_string());
            }
        }
        Ok(ids)
    }

    pub async fn get_cursor(&self) -> Result<Option<CrawlCursor>, StoreError> {
        match self.store.get(CURSOR_KEY).await? {
            Some(bytes) => Ok(Some(decode(CURSOR_KEY, &bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn set_cursor(&self, cursor: &CrawlCursor) -> Result<(), StoreError> {
        let bytes = encode(CURSOR_KEY, cursor)?;
        self.store.put(CURSOR_KEY, &bytes).await?;
        Ok(())
    }

    /// Forget the cursor so the next traversal starts from genesis.
    pub async fn clear_cursor(&self) -> Result<bool, StoreError> {
        Ok(self.store.delete(CURSOR_KEY).await?)
    }

    /// Drop every marker and the cursor. Returns the number of markers removed.
    pub async fn reset(&self) -> Result<u64, StoreError> {
        let removed = self.store.delete_prefix(SEEN_PREFIX).await?;
        self.store.delete(CURSOR_KEY).await?;
        Ok(removed)
    }

    pub async fn stats(&self) -> Result<SeenStats, StoreError> {
        let mut stats = SeenStats::default();
        for (key, bytes) in self.store.scan_prefix(SEEN_PREFIX).await? {
            let record: SeenRecord = decode(&key, &bytes)?;
            stats.seen += 1;
            if record.published {
                stats.published += 1;
            } else if record.document.is_some() {
                stats.pending += 1;
            } else {
                stats.rejected += 1;
            }
        }
        Ok(stats)
    }
}
