//! Shared test doubles
//!
//! A programmable backend used as both mock and spy: unit tests load it
//! with canned records/search pages, then assert on call counters and
//! the last parameter bag each operation saw.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::backend::{Backend, RetrieveBatch};
use crate::error::{BackendError, Result};
use crate::params::ParamBag;
use crate::query::Query;
use crate::record::Record;
use crate::response::RecordCollection;

/// Programmable spy backend
pub(crate) struct MockBackend {
    id: String,
    records: HashMap<String, Value>,
    search_hits: Vec<(String, Value)>,
    fail_reason: Option<String>,
    batch: bool,
    search_calls: AtomicUsize,
    retrieve_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    last_params: Mutex<Option<ParamBag>>,
}

impl MockBackend {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            records: HashMap::new(),
            search_hits: Vec::new(),
            fail_reason: None,
            batch: false,
            search_calls: AtomicUsize::new(0),
            retrieve_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            last_params: Mutex::new(None),
        }
    }

    /// Serve `raw` for retrievals of `id`
    pub fn with_record(mut self, id: impl Into<String>, raw: Value) -> Self {
        self.records.insert(id.into(), raw);
        self
    }

    /// Serve these hits for any search
    pub fn with_search_hits(mut self, hits: Vec<(impl Into<String>, Value)>) -> Self {
        self.search_hits = hits.into_iter().map(|(id, raw)| (id.into(), raw)).collect();
        self
    }

    /// Fail every operation with a backend error carrying `reason`
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.fail_reason = Some(reason.into());
        self
    }

    /// Advertise the batch-retrieval capability
    pub fn expose_batch(mut self) -> Self {
        self.batch = true;
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn retrieve_calls(&self) -> usize {
        self.retrieve_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// The parameter bag the most recent operation received
    pub fn last_params(&self) -> Option<ParamBag> {
        self.last_params.lock().unwrap().clone()
    }

    fn observe(&self, params: &ParamBag) -> Result<()> {
        *self.last_params.lock().unwrap() = Some(params.clone());
        match &self.fail_reason {
            Some(reason) => Err(BackendError::new(reason.clone()).into()),
            None => Ok(()),
        }
    }

    fn stamped(&self, mut collection: RecordCollection) -> RecordCollection {
        collection.set_source(&self.id);
        collection
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn identifier(&self) -> &str {
        &self.id
    }

    async fn search(
        &self,
        _query: &Query,
        offset: u64,
        _limit: u64,
        params: &ParamBag,
    ) -> Result<RecordCollection> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.observe(params)?;
        let mut collection = RecordCollection::new(self.search_hits.len() as u64, offset);
        for (id, raw) in &self.search_hits {
            collection.add(Record::new(id, raw.clone()));
        }
        Ok(self.stamped(collection))
    }

    async fn retrieve(&self, id: &str, params: &ParamBag) -> Result<RecordCollection> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        self.observe(params)?;
        let mut collection = match self.records.get(id) {
            Some(raw) => {
                let mut c = RecordCollection::new(1, 0);
                c.add(Record::new(id, raw.clone()));
                c
            }
            None => RecordCollection::new(0, 0),
        };
        collection = self.stamped(collection);
        Ok(collection)
    }

    fn as_retrieve_batch(&self) -> Option<&dyn RetrieveBatch> {
        self.batch.then_some(self as &dyn RetrieveBatch)
    }
}

#[async_trait]
impl RetrieveBatch for MockBackend {
    async fn retrieve_batch(
        &self,
        ids: &[String],
        params: &ParamBag,
    ) -> Result<RecordCollection> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.observe(params)?;
        let found: Vec<Record> = ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|raw| Record::new(id, raw.clone())))
            .collect();
        let mut collection = RecordCollection::new(found.len() as u64, 0);
        for record in found {
            collection.add(record);
        }
        Ok(self.stamped(collection))
    }
}
