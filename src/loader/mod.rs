//! Record loading with cache and fallback chain
//!
//! [`RecordLoader`] materializes records by id/source, consulting the
//! record cache before or after live search depending on the per-source
//! policy, then the registered fallback loader, and finally either a
//! synthetic missing record or a typed `RecordMissing` error. Batch
//! loading runs the same chain per source, concurrently across sources,
//! and always returns results in the caller's original request order.

mod fallback;

pub use fallback::{FallbackLoader, SearchBackedFallbackLoader};

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::try_join_all;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::RecordCache;
use crate::error::{Error, Result};
use crate::params::ParamBag;
use crate::record::Record;
use crate::response::RecordCollection;
use crate::service::SearchService;

/// One requested record in a batch load
#[derive(Debug, Clone)]
pub struct RecordRequest {
    /// Record id within the source
    pub id: String,
    /// Source identifier the record lives in
    pub source: String,
    /// Caller-supplied metadata for a placeholder, should the record
    /// turn out to be missing everywhere
    pub extra_fields: Value,
}

impl RecordRequest {
    /// Request one record
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            extra_fields: Value::Object(Default::default()),
        }
    }

    /// Attach placeholder metadata
    pub fn with_extra_fields(mut self, extra_fields: Value) -> Self {
        self.extra_fields = extra_fields;
        self
    }
}

/// Batch requests grouped by source, order and duplicates preserved
struct SourceAndIdList {
    /// Distinct sources in first-appearance order
    sources: Vec<String>,
    /// Source -> deduplicated ids in first-appearance order
    ids: HashMap<String, Vec<String>>,
}

impl SourceAndIdList {
    fn new(requests: &[RecordRequest]) -> Self {
        let mut sources = Vec::new();
        let mut ids: HashMap<String, Vec<String>> = HashMap::new();
        for request in requests {
            if !ids.contains_key(&request.source) {
                sources.push(request.source.clone());
            }
            let slot = ids.entry(request.source.clone()).or_default();
            if !slot.contains(&request.id) {
                slot.push(request.id.clone());
            }
        }
        Self { sources, ids }
    }

    fn sources(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.as_str())
    }

    fn ids_for(&self, source: &str) -> &[String] {
        self.ids.get(source).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Ids still unaccounted for at one stage of the loading chain
struct Checklist {
    remaining: Vec<String>,
}

impl Checklist {
    fn new(ids: Vec<String>) -> Self {
        Self { remaining: ids }
    }

    /// Mark every id this record answers (directly or via its
    /// `previous_id`) as found
    fn check(&mut self, record: &Record) {
        self.remaining.retain(|id| !record.matches_id(id));
    }

    fn remaining(&self) -> &[String] {
        &self.remaining
    }

    fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Record loader over the search service, cache and fallback registry
pub struct RecordLoader {
    service: Arc<SearchService>,
    cache: Option<Arc<RecordCache>>,
    fallbacks: HashMap<String, Arc<dyn FallbackLoader>>,
}

impl RecordLoader {
    /// Create a loader with no cache and no fallback loaders
    pub fn new(service: Arc<SearchService>) -> Self {
        Self {
            service,
            cache: None,
            fallbacks: HashMap::new(),
        }
    }

    /// Attach a record cache
    pub fn with_cache(mut self, cache: Arc<RecordCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Register the fallback loader for a source
    pub fn register_fallback(&mut self, source: &str, loader: Arc<dyn FallbackLoader>) {
        self.fallbacks.insert(source.to_string(), loader);
    }

    /// Switch the cache's policy context (no-op without a cache)
    pub fn set_cache_context(&self, context: &str) {
        if let Some(cache) = &self.cache {
            cache.set_context(context);
        }
    }

    /// Load one record
    ///
    /// Chain: primary cache -> live retrieve -> fallback cache ->
    /// fallback loader -> synthetic missing record (`tolerate_missing`)
    /// or `RecordMissing`. A backend failure during live retrieval
    /// propagates unless `tolerate_missing` is set, in which case the
    /// chain continues as if the search came back empty.
    pub async fn load(
        &self,
        id: &str,
        source: &str,
        tolerate_missing: bool,
        params: Option<&ParamBag>,
    ) -> Result<Record> {
        // an empty id can never resolve; skip the whole chain
        if id.is_empty() {
            return if tolerate_missing {
                Ok(Record::missing(id, source, Value::Object(Default::default())))
            } else {
                Err(Error::record_missing(source, id))
            };
        }

        if let Some(cache) = self.cache.as_ref().filter(|c| c.is_primary(source)) {
            if let Some(record) = cache.lookup(id, source).await?.into_iter().next() {
                debug!(%source, %id, "primary cache hit, skipping live search");
                return Ok(record);
            }
        }

        let params = params.cloned().unwrap_or_default();
        let live = match self.service.retrieve(source, id, params).await {
            Ok(collection) => collection,
            Err(Error::Backend(err)) if tolerate_missing => {
                warn!(%source, %id, reason = %err.reason, "tolerating backend failure during load");
                RecordCollection::new(0, 0)
            }
            Err(other) => return Err(other),
        };
        if let Some(record) = live.into_records().into_iter().next() {
            return Ok(record);
        }

        if let Some(cache) = self.cache.as_ref().filter(|c| c.is_fallback(source)) {
            if let Some(record) = cache.lookup(id, source).await?.into_iter().next() {
                debug!(%source, %id, "fallback cache hit after empty live search");
                return Ok(record);
            }
        }

        if let Some(loader) = self.fallbacks.get(source) {
            let wanted = [id.to_string()];
            let records = match loader.load(&wanted).await {
                Ok(records) => records,
                Err(Error::Backend(err)) if tolerate_missing => {
                    warn!(%source, %id, reason = %err.reason, "tolerating fallback loader failure during load");
                    Vec::new()
                }
                Err(other) => return Err(other),
            };
            if let Some(mut record) = records.into_iter().find(|r| r.matches_id(id)) {
                record.mark_fallback();
                return Ok(record);
            }
        }

        if tolerate_missing {
            Ok(Record::missing(id, source, Value::Object(Default::default())))
        } else {
            Err(Error::record_missing(source, id))
        }
    }

    /// Load many records, preserving the caller's request order
    ///
    /// Ids are grouped by source and each source's chain runs
    /// concurrently; all sub-requests are joined before reassembly.
    /// Duplicates of the same id occupy every requested position and
    /// unfound ids become synthetic missing records carrying the
    /// request's extra fields. With `tolerate_backend_errors` a failing
    /// source contributes no records instead of failing the whole batch.
    pub async fn load_batch(
        &self,
        requests: &[RecordRequest],
        tolerate_backend_errors: bool,
        params_by_source: Option<&HashMap<String, ParamBag>>,
    ) -> Result<Vec<Record>> {
        let list = SourceAndIdList::new(requests);
        let futures = list.sources().map(|source| {
            let params = params_by_source
                .and_then(|m| m.get(source))
                .cloned()
                .unwrap_or_default();
            self.load_source(
                source.to_string(),
                list.ids_for(source).to_vec(),
                params,
                tolerate_backend_errors,
            )
        });
        let per_source: HashMap<String, Vec<Record>> =
            try_join_all(futures).await?.into_iter().collect();

        Ok(requests
            .iter()
            .map(|request| {
                per_source
                    .get(&request.source)
                    .and_then(|records| records.iter().find(|r| r.matches_id(&request.id)))
                    .cloned()
                    .unwrap_or_else(|| {
                        Record::missing(&request.id, &request.source, request.extra_fields.clone())
                    })
            })
            .collect())
    }

    /// Run the loading chain for one source's ids
    async fn load_source(
        &self,
        source: String,
        ids: Vec<String>,
        params: ParamBag,
        tolerate_backend_errors: bool,
    ) -> Result<(String, Vec<Record>)> {
        let mut found = Vec::new();
        let mut checklist = Checklist::new(ids);

        if let Some(cache) = self.cache.as_ref().filter(|c| c.is_primary(&source)) {
            for record in cache
                .lookup_batch(checklist.remaining(), &source)
                .await?
            {
                checklist.check(&record);
                found.push(record);
            }
        }

        if !checklist.is_empty() {
            match self
                .service
                .retrieve_batch(&source, checklist.remaining().to_vec(), params)
                .await
            {
                Ok(collection) => {
                    for record in collection.into_records() {
                        checklist.check(&record);
                        found.push(record);
                    }
                }
                Err(Error::Backend(err)) if tolerate_backend_errors => {
                    warn!(%source, reason = %err.reason, "tolerating backend failure in batch load");
                }
                Err(other) => return Err(other),
            }
        }

        if !checklist.is_empty() {
            if let Some(loader) = self.fallbacks.get(&source) {
                let records = match loader.load(checklist.remaining()).await {
                    Ok(records) => records,
                    Err(Error::Backend(err)) if tolerate_backend_errors => {
                        warn!(%source, reason = %err.reason, "tolerating fallback loader failure in batch load");
                        Vec::new()
                    }
                    Err(other) => return Err(other),
                };
                for mut record in records {
                    record.mark_fallback();
                    checklist.check(&record);
                    found.push(record);
                }
            }
        }

        if !checklist.is_empty() {
            if let Some(cache) = self.cache.as_ref().filter(|c| c.is_fallback(&source)) {
                for record in cache
                    .lookup_batch(checklist.remaining(), &source)
                    .await?
                {
                    checklist.check(&record);
                    found.push(record);
                }
            }
        }

        Ok((source, found))
    }
}
