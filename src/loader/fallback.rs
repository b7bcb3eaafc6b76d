//! Fallback loaders: last-resort record location strategies
//!
//! A fallback loader is consulted per source when neither live search
//! nor the cache produced a record. The trait accepts a batch of ids so
//! it slots into the batch loading chain, but implementations keep the
//! one-id-at-a-time invocation contract internally.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::params::ParamBag;
use crate::query::Query;
use crate::record::Record;
use crate::service::SearchService;

/// Per-source strategy for locating records the primary chain missed
#[async_trait]
pub trait FallbackLoader: Send + Sync {
    /// Attempt to locate records for the given ids
    ///
    /// Returned records may carry a different id than requested; they
    /// record the requested id as their `previous_id` so batch loading
    /// can still match them.
    async fn load(&self, ids: &[String]) -> Result<Vec<Record>>;
}

/// Fallback loader running a secondary query against another index
///
/// Searches a configured backend for each id on a configured field
/// (e.g. a control-number field holding the ids of a retired index).
pub struct SearchBackedFallbackLoader {
    service: Arc<SearchService>,
    backend_id: String,
    id_field: String,
}

impl SearchBackedFallbackLoader {
    /// Create a loader searching `backend_id` on `id_field`
    pub fn new(
        service: Arc<SearchService>,
        backend_id: impl Into<String>,
        id_field: impl Into<String>,
    ) -> Self {
        Self {
            service,
            backend_id: backend_id.into(),
            id_field: id_field.into(),
        }
    }
}

#[async_trait]
impl FallbackLoader for SearchBackedFallbackLoader {
    async fn load(&self, ids: &[String]) -> Result<Vec<Record>> {
        let mut found = Vec::new();
        // one id at a time, matching the candidate ids individually
        for id in ids {
            let query = Query::with_handler(format!("\"{id}\""), self.id_field.clone());
            let collection = self
                .service
                .search(&self.backend_id, query, 0, 1, ParamBag::new())
                .await?;
            if let Some(record) = collection.into_records().into_iter().next() {
                debug!(%id, new_id = record.id(), "fallback loader located record");
                let mut record = record;
                record.set_previous_id(id);
                found.push(record);
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::SearchService;
    use crate::test_util::MockBackend;
    use serde_json::json;

    #[tokio::test]
    async fn test_search_backed_loader_records_previous_id() {
        let backend = Arc::new(
            MockBackend::new("secondary").with_search_hits(vec![("new-id", json!({}))]),
        );
        let mut service = SearchService::new();
        service.register_backend(backend.clone());

        let loader =
            SearchBackedFallbackLoader::new(Arc::new(service), "secondary", "ctrlnum");
        let records = loader.load(&["old-id".to_string()]).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), "new-id");
        assert_eq!(records[0].previous_id(), Some("old-id"));
        assert!(records[0].matches_id("old-id"));
    }

    #[tokio::test]
    async fn test_loader_queries_once_per_id() {
        let backend = Arc::new(MockBackend::new("secondary"));
        let mut service = SearchService::new();
        service.register_backend(backend.clone());

        let loader =
            SearchBackedFallbackLoader::new(Arc::new(service), "secondary", "ctrlnum");
        let records = loader
            .load(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();

        assert!(records.is_empty());
        assert_eq!(backend.search_calls(), 3);
    }
}
