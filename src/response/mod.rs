//! Normalized search responses
//!
//! A [`RecordCollection`] is the uniform result of any search/retrieve
//! operation, independent of which backend produced it: a restartable
//! sequence of records plus the total hit count, paging offset, facets
//! and any non-fatal errors the backend reported alongside the results.
//!
//! A [`RecordCollectionFactory`] maps one backend's raw decoded response
//! to a collection. A malformed container shape is a hard error, never a
//! degraded result.

mod json;

pub use json::JsonCollectionFactory;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::record::Record;

/// A facet value and the number of hits carrying it
pub type FacetCount = (String, u64);

/// The normalized result of a search or retrieve operation
///
/// `total` is an upstream estimate independent of page size, so
/// `records.len() <= total - offset` is NOT an invariant. `offset`
/// equals `(page - 1) * page_size` when the backend reports paging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordCollection {
    records: Vec<Record>,
    total: u64,
    offset: u64,
    source: Option<String>,
    facets: BTreeMap<String, Vec<FacetCount>>,
    errors: Vec<String>,
}

impl RecordCollection {
    /// Create an empty collection with the given paging view
    pub fn new(total: u64, offset: u64) -> Self {
        Self {
            total,
            offset,
            ..Self::default()
        }
    }

    /// Append a record
    pub fn add(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Iterate the records; each call restarts from the first record
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// The first record, if any
    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }

    /// Number of records on this page
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether this page holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total hit count as estimated by the backend
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Offset of this page within the full result set
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The source identifier, once the owning backend has set it
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Stamp the collection and every contained record with the backend
    /// identifier that produced them
    pub fn set_source(&mut self, source: &str) {
        self.source = Some(source.to_string());
        for record in &mut self.records {
            record.set_source(source);
        }
    }

    /// Facet counts keyed by field name
    pub fn facets(&self) -> &BTreeMap<String, Vec<FacetCount>> {
        &self.facets
    }

    /// Replace the facet mapping
    pub fn set_facets(&mut self, facets: BTreeMap<String, Vec<FacetCount>>) {
        self.facets = facets;
    }

    /// Non-fatal errors the backend reported alongside the results
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Record a non-fatal backend-reported error
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Consume the collection, yielding its records
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Maps one backend's raw decoded response to a [`RecordCollection`]
///
/// Implementations must fail with [`crate::Error::InvalidResponse`] when
/// the raw payload is not the container shape they expect; partial
/// recovery from a malformed response is never attempted.
pub trait RecordCollectionFactory: Send + Sync {
    /// Build a collection from a raw decoded response
    fn collection(&self, raw: Value) -> Result<RecordCollection>;
}
