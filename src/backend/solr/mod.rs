//! Solr-style backend adapter
//!
//! Demonstrates the search pipeline every adapter follows: translate the
//! query, merge the caller's parameters, apply paging, call the
//! transport, hand the raw payload to the collection factory, and stamp
//! the result with this backend's source identifier.

mod connector;

pub use connector::{SolrConnector, SolrConnectorBuilder};

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::params::ParamBag;
use crate::query::Query;
use crate::response::{JsonCollectionFactory, RecordCollection, RecordCollectionFactory};

use super::{Backend, RetrieveBatch};

/// Backend adapter for a Solr-style engine
pub struct SolrBackend {
    identifier: String,
    connector: SolrConnector,
    factory: Box<dyn RecordCollectionFactory>,
    unique_key: String,
}

impl SolrBackend {
    /// Create a backend over the given connector, using the default
    /// JSON factory and `id` as the unique key field
    pub fn new(identifier: impl Into<String>, connector: SolrConnector) -> Self {
        Self {
            identifier: identifier.into(),
            connector,
            factory: Box::new(JsonCollectionFactory::default()),
            unique_key: "id".to_string(),
        }
    }

    /// Replace the collection factory
    pub fn with_factory(mut self, factory: Box<dyn RecordCollectionFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Set the unique key field used for id lookups
    pub fn with_unique_key(mut self, field: impl Into<String>) -> Self {
        self.unique_key = field.into();
        self
    }

    /// Translate a query into the engine's `q` parameter
    fn build_query_string(query: &Query) -> String {
        if query.is_all_fields() {
            query.expression().to_string()
        } else {
            format!("{}:({})", query.handler(), query.expression())
        }
    }

    /// Escape a raw id for use inside a quoted term
    fn escape_id(id: &str) -> String {
        id.replace('\\', "\\\\").replace('"', "\\\"")
    }

    /// Build the wire parameters for a search
    ///
    /// Caller params go in first; the reserved keys (`q`, `start`,
    /// `rows`, `wt`) are then set on top so a caller-supplied value can
    /// never double up on the wire.
    fn search_params(&self, query: &Query, offset: u64, limit: u64, params: &ParamBag) -> ParamBag {
        let mut request = params.clone();
        request.set("q", Self::build_query_string(query));
        request.set("start", offset.to_string());
        request.set("rows", limit.to_string());
        request.set("wt", "json");
        request
    }

    /// Build the wire parameters for a single-id retrieve
    fn retrieve_params(&self, id: &str, params: &ParamBag) -> ParamBag {
        let mut request = params.clone();
        request.set(
            "q",
            format!("{}:\"{}\"", self.unique_key, Self::escape_id(id)),
        );
        request.set("rows", "1");
        request.set("wt", "json");
        request
    }

    /// Build the wire parameters for a batch retrieve
    fn batch_params(&self, ids: &[String], params: &ParamBag) -> ParamBag {
        let terms = ids
            .iter()
            .map(|id| format!("\"{}\"", Self::escape_id(id)))
            .collect::<Vec<_>>()
            .join(" OR ");
        let mut request = params.clone();
        request.set("q", format!("{}:({})", self.unique_key, terms));
        request.set("rows", ids.len().to_string());
        request.set("wt", "json");
        request
    }

    async fn run(&self, params: ParamBag) -> Result<RecordCollection> {
        let raw = self.connector.query(&params).await?;
        let mut collection = self.factory.collection(raw)?;
        collection.set_source(&self.identifier);
        Ok(collection)
    }
}

#[async_trait]
impl Backend for SolrBackend {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn search(
        &self,
        query: &Query,
        offset: u64,
        limit: u64,
        params: &ParamBag,
    ) -> Result<RecordCollection> {
        debug!(backend = %self.identifier, offset, limit, "searching");
        self.run(self.search_params(query, offset, limit, params)).await
    }

    async fn retrieve(&self, id: &str, params: &ParamBag) -> Result<RecordCollection> {
        debug!(backend = %self.identifier, %id, "retrieving record");
        self.run(self.retrieve_params(id, params)).await
    }

    fn as_retrieve_batch(&self) -> Option<&dyn RetrieveBatch> {
        Some(self)
    }
}

#[async_trait]
impl RetrieveBatch for SolrBackend {
    async fn retrieve_batch(
        &self,
        ids: &[String],
        params: &ParamBag,
    ) -> Result<RecordCollection> {
        if ids.is_empty() {
            return Ok(RecordCollection::new(0, 0));
        }
        debug!(backend = %self.identifier, count = ids.len(), "retrieving batch");
        self.run(self.batch_params(ids, params)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_fields_query_passes_expression_through() {
        let query = Query::new("dublin history");
        assert_eq!(SolrBackend::build_query_string(&query), "dublin history");
    }

    #[test]
    fn test_scoped_query_wraps_handler() {
        let query = Query::with_handler("yeats", "author");
        assert_eq!(SolrBackend::build_query_string(&query), "author:(yeats)");
    }

    #[test]
    fn test_escape_id_handles_quotes_and_backslashes() {
        assert_eq!(SolrBackend::escape_id(r#"a"b\c"#), r#"a\"b\\c"#);
    }

    fn backend() -> SolrBackend {
        let connector = SolrConnectorBuilder::new()
            .base_url("http://localhost:8983/solr")
            .build()
            .unwrap();
        SolrBackend::new("solr", connector)
    }

    #[test]
    fn test_caller_params_cannot_duplicate_reserved_keys() {
        let mut params = ParamBag::new();
        params.set("q", "smuggled");
        params.set("rows", "9999");
        params.add("fl", "id");
        params.add("fl", "title");

        let request = backend().search_params(&Query::new("dublin"), 0, 20, &params);

        assert_eq!(request.get("q"), Some(&vec!["dublin".to_string()][..]));
        assert_eq!(request.first("rows"), Some("20"));
        assert_eq!(request.first("start"), Some("0"));
        assert_eq!(
            request.get("fl"),
            Some(&vec!["id".to_string(), "title".to_string()][..])
        );
    }

    #[test]
    fn test_retrieve_and_batch_params_override_caller_query() {
        let mut params = ParamBag::new();
        params.set("q", "smuggled");

        let single = backend().retrieve_params("42", &params);
        assert_eq!(single.get("q"), Some(&vec![r#"id:"42""#.to_string()][..]));
        assert_eq!(single.first("rows"), Some("1"));

        let ids = vec!["42".to_string(), "43".to_string()];
        let batch = backend().batch_params(&ids, &params);
        assert_eq!(
            batch.get("q"),
            Some(&vec![r#"id:("42" OR "43")"#.to_string()][..])
        );
        assert_eq!(batch.first("rows"), Some("2"));
    }
}
