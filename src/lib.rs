//! # ION Crawler
//!
//! Discovers newly published DID documents on an ION node, keeps the ones
//! whose declared type is accepted, and publishes a discovery event for
//! each new match.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  ION feed   │──▶│  CrawlCycle   │──▶│  Event sink  │
//! │ (paginated) │   │ filter+dedup │   │ (HTTP / log) │
//! └─────────────┘   └──────┬───────┘   └──────────────┘
//!                          ▼
//!                   ┌──────────────┐
//!                   │  SeenStore   │
//!                   │ SQLite (K/V) │
//!                   └──────────────┘
//! ```
//!
//! Delivery is at-least-once. A document is marked seen before it is
//! published and marked published after the sink confirms it; anything
//! stuck in between is republished by the next cycle. Every event carries
//! the document id as its idempotency key.
//!
//! ## Quick Start
//!
//! ```bash
//! ion-crawler init        # create database
//! ion-crawler run         # one crawl cycle
//! ion-crawler serve       # crawl every crawler.interval_minutes
//! ion-crawler status      # cursor and pending counts
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`traits`] | Feed and publisher seams |
//! | [`connector_ion`] | HTTP client for the ION operations feed |
//! | [`publisher`] | HTTP and log event publishers |
//! | [`retry`] | Backoff policy shared by the HTTP clients |
//! | [`crawl`] | The crawl cycle orchestrator |
//! | [`scheduler`] | Periodic cycle trigger |
//! | [`status`] | `status` and `reset` commands |
//! | [`sqlite_store`] | SQLite object store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod connector_ion;
pub mod crawl;
pub mod db;
pub mod migrate;
pub mod publisher;
pub mod retry;
pub mod scheduler;
pub mod sqlite_store;
pub mod status;
pub mod traits;
