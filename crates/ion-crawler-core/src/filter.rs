//! Selection of relevant feed records.
//!
//! A record matches when its declared `type` is one of the accepted tags.
//! The identity network stores type tags base64-encoded (`Z3hp` is
//! `gxi`), so a tag matches either verbatim or after decoding.
//!
//! Optional random sampling thins matches for load testing. It is off at
//! the default rate of `1.0`, where the filter is fully deterministic.
//! A sampled-out document is reported with its id so the caller can
//! remember the decision instead of drawing again on the next re-read.

use std::collections::BTreeSet;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::models::{CrawlerConfig, DidDocument, RawRecord};

/// Result of classifying one raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    Matched(DidDocument),
    /// Well-formed, but of another type.
    Excluded,
    /// Accepted type, but not selected by the sampling draw.
    SampledOut { id: String },
    /// Could not be parsed. `id` is present when the record named one,
    /// so it can still be marked seen.
    Malformed { id: Option<String> },
}

#[derive(Debug, Clone)]
pub struct DocumentFilter {
    accepted: BTreeSet<String>,
    sampling_rate: f64,
}

impl DocumentFilter {
    pub fn new(accepted: BTreeSet<String>, sampling_rate: f64) -> Self {
        Self {
            accepted,
            sampling_rate,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.accepted_types.clone(), config.sampling_rate)
    }

    /// Resolve a declared type to the accepted tag it stands for.
    pub fn accepted_tag(&self, declared: &str) -> Option<&str> {
        if let Some(tag) = self.accepted.get(declared) {
            return Some(tag.as_str());
        }
        let decoded = decode_type_tag(declared)?;
        self.accepted.get(decoded.as_str()).map(String::as_str)
    }

    /// Classify `record`. Never fails; unparseable input is `Malformed`.
    pub fn matches<R: Rng + ?Sized>(
        &self,
        record: &RawRecord,
        observed_at: DateTime<Utc>,
        rng: &mut R,
    ) -> FilterOutcome {
        let Some(fields) = record.as_object() else {
            return FilterOutcome::Malformed { id: None };
        };

        let id = ["id", "didSuffix"]
            .iter()
            .filter_map(|k| fields.get(*k).and_then(|v| v.as_str()))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string);
        let Some(id) = id else {
            return FilterOutcome::Malformed { id: None };
        };

        let declared = match fields.get("type").and_then(|v| v.as_str()) {
            Some(t) if !t.trim().is_empty() => t.trim(),
            _ => return FilterOutcome::Malformed { id: Some(id) },
        };

        let Some(tag) = self.accepted_tag(declared) else {
            return FilterOutcome::Excluded;
        };

        if self.sampling_rate < 1.0 && rng.gen::<f64>() >= self.sampling_rate {
            return FilterOutcome::SampledOut { id };
        }

        let payload = fields
            .get("document")
            .cloned()
            .unwrap_or_else(|| record.clone());

        FilterOutcome::Matched(DidDocument {
            id,
            doc_type: tag.to_string(),
            payload,
            observed_at,
        })
    }
}

fn decode_type_tag(declared: &str) -> Option<String> {
    [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(declared).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
