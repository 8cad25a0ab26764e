//! # ION Crawler Core
//!
//! Runtime-free logic for the ION crawler: the document and marker
//! models, the error taxonomy, the key-value [`store::ObjectStore`]
//! abstraction, the two-phase [`seen::SeenStore`] layered on top of it,
//! and the [`filter`] that decides which feed records are relevant.
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies. Network and
//! database backends live in the `ion-crawler` crate.

pub mod error;
pub mod filter;
pub mod models;
pub mod seen;
pub mod store;
