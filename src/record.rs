//! Uniform record abstraction over heterogeneous backend payloads
//!
//! Every backend's native payload (Solr doc, vendor JSON object, cached
//! blob) is carried as raw JSON behind the same capability surface:
//! a unique id, a source identifier, and the raw data. Flags track how
//! the record was obtained (live, cache, fallback loader) and whether it
//! is a synthetic placeholder for a record that could not be found.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single record materialized from a backend response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: String,
    source: Option<String>,
    previous_id: Option<String>,
    raw: Value,
    fallback: bool,
    cached: bool,
    missing: bool,
}

impl Record {
    /// Create a record from its unique id and raw backend payload
    pub fn new(id: impl Into<String>, raw: Value) -> Self {
        Self {
            id: id.into(),
            source: None,
            previous_id: None,
            raw,
            fallback: false,
            cached: false,
            missing: false,
        }
    }

    /// Create a synthetic placeholder for a record that was not found
    ///
    /// `extra_fields` carries any caller-supplied metadata (e.g. a title
    /// remembered from a saved list) so placeholders can render minimal
    /// detail.
    pub fn missing(
        id: impl Into<String>,
        source: impl Into<String>,
        extra_fields: Value,
    ) -> Self {
        let id = id.into();
        let source = source.into();
        let mut raw = serde_json::json!({ "id": id, "source": source });
        if let (Some(map), Some(extra)) = (raw.as_object_mut(), extra_fields.as_object()) {
            for (key, value) in extra {
                map.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        Self {
            id,
            source: Some(source),
            previous_id: None,
            raw,
            fallback: false,
            cached: false,
            missing: true,
        }
    }

    /// The record's unique id within its source
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The source identifier, once the materializing factory has set it
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Set the source identifier
    ///
    /// Called once by the factory/backend that materializes the record;
    /// read many times afterward.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = Some(source.into());
    }

    /// The id this record was requested under, when a fallback loader
    /// resolved it to a record with a different id
    pub fn previous_id(&self) -> Option<&str> {
        self.previous_id.as_deref()
    }

    /// Record the id the caller originally asked for
    pub fn set_previous_id(&mut self, id: impl Into<String>) {
        self.previous_id = Some(id.into());
    }

    /// The raw decoded backend payload
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Whether this record came from a fallback loader rather than the
    /// authoritative source
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Mark the record as a best-effort fallback match
    pub fn mark_fallback(&mut self) {
        self.fallback = true;
    }

    /// Whether this record was served from the record cache
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Mark the record as served from the cache
    pub fn mark_cached(&mut self) {
        self.cached = true;
    }

    /// Whether this is a synthetic placeholder for an unfound record
    pub fn is_missing(&self) -> bool {
        self.missing
    }

    /// Whether the record answers a request for `id`, either directly or
    /// through the id it was originally requested under
    pub fn matches_id(&self, id: &str) -> bool {
        self.id == id || self.previous_id.as_deref() == Some(id)
    }
}
