//! Record cache: a secondary store of previously-seen records
//!
//! The cache is consulted by the record loader either before live search
//! (when a source is configured as **primary** in the active policy
//! context) or after an empty live search (when configured as
//! **fallback**). Cached payloads are materialized back into records
//! through a per-source factory map, which is what lets one cached
//! collection multiplex records that originated from different backends.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::record::Record;

/// Name of the policy context used when none has been selected
pub const DEFAULT_CONTEXT: &str = "default";

/// How the cache participates for one source in one policy context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Consult the cache before live search; a hit short-circuits
    Primary,
    /// Consult the cache only after live search returned nothing
    Fallback,
}

/// One cached payload with its origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Source identifier of the backend that produced the payload
    pub source: String,
    /// Record id within that source
    pub id: String,
    /// Raw record payload as it came from the backend
    pub data: Value,
}

/// Keyed store mapping `(source, id)` to raw payloads
///
/// The concrete store (SQL table, key-value server) is an external
/// collaborator behind this trait.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All cached payloads for one `(source, id)` pair
    async fn lookup(&self, source: &str, id: &str) -> Result<Vec<CacheEntry>>;

    /// Cached payloads for many ids of one source
    async fn lookup_batch(&self, source: &str, ids: &[String]) -> Result<Vec<CacheEntry>>;

    /// Insert or overwrite one cached payload
    async fn save(&self, entry: CacheEntry) -> Result<()>;
}

/// In-memory record store, for tests and single-process deployments
#[derive(Default)]
pub struct InMemoryRecordStore {
    entries: tokio::sync::RwLock<HashMap<(String, String), Value>>,
}

impl InMemoryRecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn lookup(&self, source: &str, id: &str) -> Result<Vec<CacheEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(source.to_string(), id.to_string()))
            .map(|data| CacheEntry {
                source: source.to_string(),
                id: id.to_string(),
                data: data.clone(),
            })
            .into_iter()
            .collect())
    }

    async fn lookup_batch(&self, source: &str, ids: &[String]) -> Result<Vec<CacheEntry>> {
        let entries = self.entries.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                entries
                    .get(&(source.to_string(), id.clone()))
                    .map(|data| CacheEntry {
                        source: source.to_string(),
                        id: id.clone(),
                        data: data.clone(),
                    })
            })
            .collect())
    }

    async fn save(&self, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert((entry.source, entry.id), entry.data);
        Ok(())
    }
}

/// Constructor closure materializing a record from a cached payload
pub type RecordFactory = Arc<dyn Fn(&CacheEntry) -> Result<Record> + Send + Sync>;

/// Policy-aware record cache over a pluggable store
pub struct RecordCache {
    store: Arc<dyn RecordStore>,
    /// context -> source -> mode
    policy: HashMap<String, HashMap<String, CacheMode>>,
    context: RwLock<String>,
    factories: HashMap<String, RecordFactory>,
}

impl RecordCache {
    /// Create a cache with an empty policy, in the default context
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            policy: HashMap::new(),
            context: RwLock::new(DEFAULT_CONTEXT.to_string()),
            factories: HashMap::new(),
        }
    }

    /// Replace the whole policy table (context -> source -> mode)
    pub fn with_policy(mut self, policy: HashMap<String, HashMap<String, CacheMode>>) -> Self {
        self.policy = policy;
        self
    }

    /// Set the mode for one source in one context
    pub fn set_mode(&mut self, context: &str, source: &str, mode: CacheMode) {
        self.policy
            .entry(context.to_string())
            .or_default()
            .insert(source.to_string(), mode);
    }

    /// Register the record factory for a source
    ///
    /// Registering the same source twice is a wiring mistake and fails
    /// immediately; an *unregistered* source, by contrast, is only
    /// detected when a matching cached record is materialized.
    pub fn register_factory(&mut self, source: &str, factory: RecordFactory) -> Result<()> {
        if self.factories.contains_key(source) {
            return Err(Error::Config(format!(
                "record factory for source '{source}' is already registered"
            )));
        }
        self.factories.insert(source.to_string(), factory);
        Ok(())
    }

    /// Switch the active policy context
    pub fn set_context(&self, context: &str) {
        *self.context.write().expect("context lock poisoned") = context.to_string();
    }

    /// The active policy context
    pub fn context(&self) -> String {
        self.context.read().expect("context lock poisoned").clone()
    }

    fn mode(&self, source: &str) -> Option<CacheMode> {
        let context = self.context();
        self.policy.get(&context)?.get(source).copied()
    }

    /// Whether the cache is consulted before live search for `source`
    pub fn is_primary(&self, source: &str) -> bool {
        self.mode(source) == Some(CacheMode::Primary)
    }

    /// Whether the cache is consulted after an empty live search for `source`
    pub fn is_fallback(&self, source: &str) -> bool {
        self.mode(source) == Some(CacheMode::Fallback)
    }

    /// Whether the active context caches `source` at all
    pub fn is_cachable(&self, source: &str) -> bool {
        self.mode(source).is_some()
    }

    /// Materialize all cached records for one `(source, id)` pair
    pub async fn lookup(&self, id: &str, source: &str) -> Result<Vec<Record>> {
        let entries = self.store.lookup(source, id).await?;
        debug!(%source, %id, hits = entries.len(), "cache lookup");
        entries.iter().map(|e| self.materialize(e)).collect()
    }

    /// Materialize cached records for many ids of one source
    pub async fn lookup_batch(&self, ids: &[String], source: &str) -> Result<Vec<Record>> {
        let entries = self.store.lookup_batch(source, ids).await?;
        debug!(%source, requested = ids.len(), hits = entries.len(), "cache batch lookup");
        entries.iter().map(|e| self.materialize(e)).collect()
    }

    /// Insert or overwrite one cached payload
    pub async fn create_or_update(&self, id: &str, source: &str, data: Value) -> Result<()> {
        self.store
            .save(CacheEntry {
                source: source.to_string(),
                id: id.to_string(),
                data,
            })
            .await
    }

    /// Dispatch one cached payload through the factory registered for
    /// its source
    ///
    /// An unregistered source is fatal: silently dropping a cached
    /// record would be indistinguishable from "never cached".
    fn materialize(&self, entry: &CacheEntry) -> Result<Record> {
        let factory = self.factories.get(&entry.source).ok_or_else(|| {
            Error::InvalidResponse(format!(
                "no record factory registered for source '{}'",
                entry.source
            ))
        })?;
        let mut record = factory(entry)?;
        record.set_source(&entry.source);
        record.mark_cached();
        Ok(record)
    }
}

/// Factory reading the record id from the cache entry itself
pub fn raw_record_factory() -> RecordFactory {
    Arc::new(|entry: &CacheEntry| Ok(Record::new(&entry.id, entry.data.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn cache_with(source: &str, mode: CacheMode) -> RecordCache {
        let store = Arc::new(InMemoryRecordStore::new());
        store
            .save(CacheEntry {
                source: source.to_string(),
                id: "42".to_string(),
                data: json!({"title": "cached"}),
            })
            .await
            .unwrap();
        let mut cache = RecordCache::new(store);
        cache.set_mode(DEFAULT_CONTEXT, source, mode);
        cache.register_factory(source, raw_record_factory()).unwrap();
        cache
    }

    #[tokio::test]
    async fn test_policy_predicates_follow_active_context() {
        let mut cache = cache_with("Solr", CacheMode::Primary).await;
        cache.set_mode("favorites", "Solr", CacheMode::Fallback);

        assert!(cache.is_primary("Solr"));
        assert!(!cache.is_fallback("Solr"));

        cache.set_context("favorites");
        assert!(cache.is_fallback("Solr"));
        assert!(!cache.is_primary("Solr"));

        cache.set_context("disabled");
        assert!(!cache.is_cachable("Solr"));
    }

    #[tokio::test]
    async fn test_lookup_materializes_and_marks_cached() {
        let cache = cache_with("Solr", CacheMode::Primary).await;
        let records = cache.lookup("42", "Solr").await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_cached());
        assert_eq!(records[0].source(), Some("Solr"));
        assert_eq!(records[0].raw()["title"], "cached");
    }

    #[tokio::test]
    async fn test_unregistered_source_is_fatal_at_materialization() {
        let store = Arc::new(InMemoryRecordStore::new());
        store
            .save(CacheEntry {
                source: "Unknown".to_string(),
                id: "1".to_string(),
                data: json!({}),
            })
            .await
            .unwrap();
        let cache = RecordCache::new(store);
        let err = cache.lookup("1", "Unknown").await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_duplicate_factory_registration_fails_at_wiring() {
        let mut cache = RecordCache::new(Arc::new(InMemoryRecordStore::new()));
        cache.register_factory("Solr", raw_record_factory()).unwrap();
        let err = cache
            .register_factory("Solr", raw_record_factory())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_create_or_update_is_readable_back() {
        let cache = cache_with("Solr", CacheMode::Primary).await;
        cache
            .create_or_update("7", "Solr", json!({"title": "new"}))
            .await
            .unwrap();
        let records = cache.lookup("7", "Solr").await.unwrap();
        assert_eq!(records[0].raw()["title"], "new");

        cache
            .create_or_update("7", "Solr", json!({"title": "newer"}))
            .await
            .unwrap();
        let records = cache.lookup("7", "Solr").await.unwrap();
        assert_eq!(records[0].raw()["title"], "newer");
    }
}
