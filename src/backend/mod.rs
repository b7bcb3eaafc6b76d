//! Backend adapter contract
//!
//! Every external search engine sits behind the [`Backend`] trait:
//! accept a query or id plus a [`ParamBag`], return a normalized
//! [`RecordCollection`] or a typed backend error. Operations not common
//! to all engines (batch retrieval, work-expression clustering, holdings
//! lookup, ISSN lookup) are separate capability traits reached through
//! explicit accessor methods, so a missing capability is detected at
//! command execution time and fails fast with `UnsupportedOperation`.

pub mod solr;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::params::ParamBag;
use crate::query::Query;
use crate::response::RecordCollection;

/// Common operation contract for all backend adapters
#[async_trait]
pub trait Backend: Send + Sync {
    /// The identifier this backend is registered under
    fn identifier(&self) -> &str;

    /// Run a search and return one page of normalized results
    async fn search(
        &self,
        query: &Query,
        offset: u64,
        limit: u64,
        params: &ParamBag,
    ) -> Result<RecordCollection>;

    /// Retrieve a single record by its unique id
    async fn retrieve(&self, id: &str, params: &ParamBag) -> Result<RecordCollection>;

    /// Batch-retrieval capability, when this backend supports it
    fn as_retrieve_batch(&self) -> Option<&dyn RetrieveBatch> {
        None
    }

    /// Work-expression clustering capability, when supported
    fn as_work_expressions(&self) -> Option<&dyn WorkExpressions> {
        None
    }

    /// Holdings-lookup capability, when supported
    fn as_holdings(&self) -> Option<&dyn Holdings> {
        None
    }

    /// ISSN-lookup capability, when supported
    fn as_issn_lookup(&self) -> Option<&dyn IssnLookup> {
        None
    }
}

/// Retrieval of many records in one backend round trip
#[async_trait]
pub trait RetrieveBatch: Send + Sync {
    /// Retrieve all of `ids` in a single request
    async fn retrieve_batch(&self, ids: &[String], params: &ParamBag)
        -> Result<RecordCollection>;
}

/// Clustering of records belonging to the same abstract work
#[async_trait]
pub trait WorkExpressions: Send + Sync {
    /// Find other expressions of the work identified by `work_keys`,
    /// excluding the record `id` itself
    async fn work_expressions(
        &self,
        id: &str,
        work_keys: &[String],
        params: &ParamBag,
    ) -> Result<RecordCollection>;
}

/// Item/holdings availability lookup
#[async_trait]
pub trait Holdings: Send + Sync {
    /// Fetch raw holdings data for the record `id`
    async fn get_holdings(&self, id: &str, params: &ParamBag) -> Result<Value>;
}

/// Resolution of print/electronic ISSN relationships
#[async_trait]
pub trait IssnLookup: Send + Sync {
    /// Look up raw metadata for the given ISSNs
    async fn lookup_issns(&self, issns: &[String], params: &ParamBag) -> Result<Value>;
}
