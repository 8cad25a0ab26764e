//! Durable key-value storage abstraction.
//!
//! The [`ObjectStore`] trait is the only storage surface the crawler
//! needs: point reads and writes plus prefix scans. The
//! [`SeenStore`](crate::seen::SeenStore) maps the dedup markers and the
//! feed cursor onto it, so backends (SQLite, in-memory) stay unaware of
//! crawl semantics.
//!
//! Implementations must be `Send + Sync` to work with async runtimes,
//! and every mutating call must be durable before it returns.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

/// Abstract key-value backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get`](ObjectStore::get) | Read one value |
/// | [`put`](ObjectStore::put) | Insert or overwrite one value |
/// | [`put_if_absent`](ObjectStore::put_if_absent) | Insert only when the key is free |
/// | [`delete`](ObjectStore::delete) | Remove one key |
/// | [`scan_prefix`](ObjectStore::scan_prefix) | Snapshot of all pairs under a prefix |
/// | [`delete_prefix`](ObjectStore::delete_prefix) | Remove all keys under a prefix |
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Insert `value` unless `key` already exists.
    ///
    /// Returns `true` if the value was written. Must be atomic with
    /// respect to concurrent callers on the same key.
    async fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<bool>;

    /// Remove `key`. Returns `true` if it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Return every pair whose key starts with `prefix`, ordered by key.
    ///
    /// The result is a snapshot taken at call time; later writes are not
    /// reflected in it.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Remove every key starting with `prefix`. Returns the number removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;
}
