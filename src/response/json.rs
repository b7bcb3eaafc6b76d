//! Collection factory for Solr-style JSON responses
//!
//! Expects the classic select-handler shape:
//!
//! ```json
//! {
//!   "response": { "numFound": 123, "start": 0, "docs": [ ... ] },
//!   "facet_counts": { "facet_fields": { "format": ["Book", 7, "Map", 2] } }
//! }
//! ```

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::record::Record;

use super::{FacetCount, RecordCollection, RecordCollectionFactory};

/// Factory for the Solr select-handler JSON response shape
#[derive(Debug, Clone)]
pub struct JsonCollectionFactory {
    /// Field holding each document's unique key
    unique_key: String,
}

impl Default for JsonCollectionFactory {
    fn default() -> Self {
        Self::new("id")
    }
}

impl JsonCollectionFactory {
    /// Create a factory reading document ids from `unique_key`
    pub fn new(unique_key: impl Into<String>) -> Self {
        Self {
            unique_key: unique_key.into(),
        }
    }

    fn parse_facets(raw: &Value) -> BTreeMap<String, Vec<FacetCount>> {
        let mut facets = BTreeMap::new();
        let Some(fields) = raw
            .get("facet_counts")
            .and_then(|fc| fc.get("facet_fields"))
            .and_then(|ff| ff.as_object())
        else {
            return facets;
        };
        for (field, flat) in fields {
            // Solr emits facet fields as a flat [value, count, ...] list
            let Some(flat) = flat.as_array() else { continue };
            let counts = flat
                .chunks(2)
                .filter_map(|pair| match pair {
                    [value, count] => Some((
                        value.as_str()?.to_string(),
                        count.as_u64()?,
                    )),
                    _ => None,
                })
                .collect();
            facets.insert(field.clone(), counts);
        }
        facets
    }
}

impl RecordCollectionFactory for JsonCollectionFactory {
    fn collection(&self, raw: Value) -> Result<RecordCollection> {
        let response = raw.get("response").ok_or_else(|| {
            Error::InvalidResponse("missing 'response' container".to_string())
        })?;
        let docs = response
            .get("docs")
            .and_then(|d| d.as_array())
            .ok_or_else(|| {
                Error::InvalidResponse("'response.docs' is not an array".to_string())
            })?;
        let total = response
            .get("numFound")
            .and_then(|n| n.as_u64())
            .ok_or_else(|| {
                Error::InvalidResponse("'response.numFound' is not a number".to_string())
            })?;
        let offset = response.get("start").and_then(|s| s.as_u64()).unwrap_or(0);

        let mut collection = RecordCollection::new(total, offset);
        for doc in docs {
            let id = doc
                .get(&self.unique_key)
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    Error::InvalidResponse(format!(
                        "document missing unique key '{}'",
                        self.unique_key
                    ))
                })?;
            collection.add(Record::new(id, doc.clone()));
        }
        collection.set_facets(Self::parse_facets(&raw));
        debug!(
            total,
            offset,
            page = collection.len(),
            "built collection from JSON response"
        );
        Ok(collection)
    }
}
