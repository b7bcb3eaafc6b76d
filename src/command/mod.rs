//! Command objects for uniform backend dispatch
//!
//! A command binds one backend operation, its arguments and its result
//! slot, so the search service can resolve the target backend, wrap the
//! execution in the pre/post/error event sequence, and hand the populated
//! command back to the caller. `execute` verifies the backend supports
//! the operation (failing fast with `UnsupportedOperation` otherwise),
//! invokes it, and stores the result.

use async_trait::async_trait;
use serde_json::Value;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::params::ParamBag;
use crate::query::Query;
use crate::response::RecordCollection;

/// The result slot of an executed command
#[derive(Debug, Clone)]
pub enum CommandResult {
    /// A normalized record collection (search/retrieve operations)
    Collection(RecordCollection),
    /// A raw payload from a capability call that does not yield records
    Raw(Value),
}

impl CommandResult {
    /// Borrow the collection, when the result is one
    pub fn as_collection(&self) -> Option<&RecordCollection> {
        match self {
            Self::Collection(c) => Some(c),
            Self::Raw(_) => None,
        }
    }

    /// Consume the result into a collection, when it is one
    pub fn into_collection(self) -> Option<RecordCollection> {
        match self {
            Self::Collection(c) => Some(c),
            Self::Raw(_) => None,
        }
    }

    /// Borrow the raw payload, when the result is one
    pub fn as_raw(&self) -> Option<&Value> {
        match self {
            Self::Raw(v) => Some(v),
            Self::Collection(_) => None,
        }
    }
}

/// One backend operation plus its arguments and result slot
#[async_trait]
pub trait Command: Send {
    /// Identifier of the backend this command targets
    fn backend_id(&self) -> &str;

    /// Operation name, used as the event context
    fn context(&self) -> &'static str;

    /// The backend-specific parameters
    fn params(&self) -> &ParamBag;

    /// Mutable view of the parameters, for pre-event listeners
    fn params_mut(&mut self) -> &mut ParamBag;

    /// The stored result, populated by a successful `execute`
    fn result(&self) -> Option<&CommandResult>;

    /// Run the operation against `backend` and store the result
    async fn execute(&mut self, backend: &dyn Backend) -> Result<()>;
}

// ========== Search ==========

/// Command running a paged search
#[derive(Debug)]
pub struct SearchCommand {
    backend_id: String,
    query: Query,
    offset: u64,
    limit: u64,
    params: ParamBag,
    result: Option<CommandResult>,
}

impl SearchCommand {
    /// Create a search command
    pub fn new(
        backend_id: impl Into<String>,
        query: Query,
        offset: u64,
        limit: u64,
        params: ParamBag,
    ) -> Self {
        Self {
            backend_id: backend_id.into(),
            query,
            offset,
            limit,
            params,
            result: None,
        }
    }

    /// The query this command will run
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Consume the command into its result collection
    pub fn into_collection(self) -> Option<RecordCollection> {
        self.result.and_then(CommandResult::into_collection)
    }
}

#[async_trait]
impl Command for SearchCommand {
    fn backend_id(&self) -> &str {
        &self.backend_id
    }

    fn context(&self) -> &'static str {
        "search"
    }

    fn params(&self) -> &ParamBag {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamBag {
        &mut self.params
    }

    fn result(&self) -> Option<&CommandResult> {
        self.result.as_ref()
    }

    async fn execute(&mut self, backend: &dyn Backend) -> Result<()> {
        let collection = backend
            .search(&self.query, self.offset, self.limit, &self.params)
            .await?;
        self.result = Some(CommandResult::Collection(collection));
        Ok(())
    }
}

// ========== Retrieve ==========

/// Command retrieving one record by id
#[derive(Debug)]
pub struct RetrieveCommand {
    backend_id: String,
    id: String,
    params: ParamBag,
    result: Option<CommandResult>,
}

impl RetrieveCommand {
    /// Create a retrieve command
    pub fn new(backend_id: impl Into<String>, id: impl Into<String>, params: ParamBag) -> Self {
        Self {
            backend_id: backend_id.into(),
            id: id.into(),
            params,
            result: None,
        }
    }

    /// The id being retrieved
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Consume the command into its result collection
    pub fn into_collection(self) -> Option<RecordCollection> {
        self.result.and_then(CommandResult::into_collection)
    }
}

#[async_trait]
impl Command for RetrieveCommand {
    fn backend_id(&self) -> &str {
        &self.backend_id
    }

    fn context(&self) -> &'static str {
        "retrieve"
    }

    fn params(&self) -> &ParamBag {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamBag {
        &mut self.params
    }

    fn result(&self) -> Option<&CommandResult> {
        self.result.as_ref()
    }

    async fn execute(&mut self, backend: &dyn Backend) -> Result<()> {
        let collection = backend.retrieve(&self.id, &self.params).await?;
        self.result = Some(CommandResult::Collection(collection));
        Ok(())
    }
}

// ========== Retrieve batch ==========

/// Command retrieving many records by id
///
/// Uses the backend's batch capability when present; otherwise falls
/// back to looping single retrieves and concatenating the pages.
#[derive(Debug)]
pub struct RetrieveBatchCommand {
    backend_id: String,
    ids: Vec<String>,
    params: ParamBag,
    result: Option<CommandResult>,
}

impl RetrieveBatchCommand {
    /// Create a batch retrieve command
    pub fn new(backend_id: impl Into<String>, ids: Vec<String>, params: ParamBag) -> Self {
        Self {
            backend_id: backend_id.into(),
            ids,
            params,
            result: None,
        }
    }

    /// The ids being retrieved
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Consume the command into its result collection
    pub fn into_collection(self) -> Option<RecordCollection> {
        self.result.and_then(CommandResult::into_collection)
    }
}

#[async_trait]
impl Command for RetrieveBatchCommand {
    fn backend_id(&self) -> &str {
        &self.backend_id
    }

    fn context(&self) -> &'static str {
        "retrieve_batch"
    }

    fn params(&self) -> &ParamBag {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamBag {
        &mut self.params
    }

    fn result(&self) -> Option<&CommandResult> {
        self.result.as_ref()
    }

    async fn execute(&mut self, backend: &dyn Backend) -> Result<()> {
        let collection = if let Some(batch) = backend.as_retrieve_batch() {
            batch.retrieve_batch(&self.ids, &self.params).await?
        } else {
            // legacy path: one retrieve per id, concatenated
            let mut records = Vec::new();
            let mut total = 0u64;
            for id in &self.ids {
                let page = backend.retrieve(id, &self.params).await?;
                total += page.total();
                records.extend(page.into_records());
            }
            let mut merged = RecordCollection::new(total, 0);
            for record in records {
                merged.add(record);
            }
            merged.set_source(backend.identifier());
            merged
        };
        self.result = Some(CommandResult::Collection(collection));
        Ok(())
    }
}

// ========== Capability call ==========

/// A capability invocation not common to all backends
#[derive(Debug, Clone)]
pub enum CapabilityCall {
    /// Cluster other expressions of the same work
    WorkExpressions { id: String, work_keys: Vec<String> },
    /// Fetch holdings data for a record
    GetHoldings { id: String },
    /// Resolve print/electronic ISSN relationships
    LookupIssns { issns: Vec<String> },
}

impl CapabilityCall {
    /// Operation name, used for event contexts and error messages
    pub fn operation(&self) -> &'static str {
        match self {
            Self::WorkExpressions { .. } => "work_expressions",
            Self::GetHoldings { .. } => "get_holdings",
            Self::LookupIssns { .. } => "lookup_issns",
        }
    }
}

/// Generic command invoking a capability extension on a backend
///
/// The backend must expose the matching capability accessor; otherwise
/// execution fails with `UnsupportedOperation`.
#[derive(Debug)]
pub struct CapabilityCommand {
    backend_id: String,
    call: CapabilityCall,
    params: ParamBag,
    result: Option<CommandResult>,
}

impl CapabilityCommand {
    /// Create a capability command
    pub fn new(backend_id: impl Into<String>, call: CapabilityCall, params: ParamBag) -> Self {
        Self {
            backend_id: backend_id.into(),
            call,
            params,
            result: None,
        }
    }

    /// The capability invocation this command carries
    pub fn call(&self) -> &CapabilityCall {
        &self.call
    }

    /// Consume the command into its result slot
    pub fn into_result(self) -> Option<CommandResult> {
        self.result
    }
}

#[async_trait]
impl Command for CapabilityCommand {
    fn backend_id(&self) -> &str {
        &self.backend_id
    }

    fn context(&self) -> &'static str {
        self.call.operation()
    }

    fn params(&self) -> &ParamBag {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamBag {
        &mut self.params
    }

    fn result(&self) -> Option<&CommandResult> {
        self.result.as_ref()
    }

    async fn execute(&mut self, backend: &dyn Backend) -> Result<()> {
        let unsupported =
            || Error::unsupported(backend.identifier(), self.call.operation());
        let result = match &self.call {
            CapabilityCall::WorkExpressions { id, work_keys } => {
                let capability = backend.as_work_expressions().ok_or_else(unsupported)?;
                let collection = capability
                    .work_expressions(id, work_keys, &self.params)
                    .await?;
                CommandResult::Collection(collection)
            }
            CapabilityCall::GetHoldings { id } => {
                let capability = backend.as_holdings().ok_or_else(unsupported)?;
                CommandResult::Raw(capability.get_holdings(id, &self.params).await?)
            }
            CapabilityCall::LookupIssns { issns } => {
                let capability = backend.as_issn_lookup().ok_or_else(unsupported)?;
                CommandResult::Raw(capability.lookup_issns(issns, &self.params).await?)
            }
        };
        self.result = Some(result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MockBackend;
    use serde_json::json;

    #[tokio::test]
    async fn test_search_command_stores_result() {
        let backend = MockBackend::new("solr").with_search_hits(vec![("a", json!({}))]);
        let mut command = SearchCommand::new(
            "solr",
            Query::new("history"),
            0,
            20,
            ParamBag::new(),
        );
        command.execute(&backend).await.unwrap();
        let collection = command.into_collection().unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.first().unwrap().source(), Some("solr"));
    }

    #[test]
    fn test_commands_format_for_diagnostics() {
        let command = CapabilityCommand::new(
            "solr",
            CapabilityCall::GetHoldings { id: "42".to_string() },
            ParamBag::new(),
        );
        let rendered = format!("{command:?}");
        assert!(rendered.contains("solr"));
        assert!(rendered.contains("GetHoldings"));
    }

    #[tokio::test]
    async fn test_capability_command_fails_fast_without_capability() {
        let backend = MockBackend::new("solr");
        let mut command = CapabilityCommand::new(
            "solr",
            CapabilityCall::GetHoldings { id: "42".to_string() },
            ParamBag::new(),
        );
        let err = command.execute(&backend).await.unwrap_err();
        match err {
            Error::UnsupportedOperation { backend, operation } => {
                assert_eq!(backend, "solr");
                assert_eq!(operation, "get_holdings");
            }
            other => panic!("expected UnsupportedOperation, got {other}"),
        }
        assert!(command.result().is_none());
    }

    #[tokio::test]
    async fn test_retrieve_batch_uses_capability_when_present() {
        let backend = MockBackend::new("solr")
            .with_record("a", json!({}))
            .with_record("b", json!({}))
            .expose_batch();
        let mut command = RetrieveBatchCommand::new(
            "solr",
            vec!["a".to_string(), "b".to_string()],
            ParamBag::new(),
        );
        command.execute(&backend).await.unwrap();
        assert_eq!(backend.batch_calls(), 1);
        assert_eq!(backend.retrieve_calls(), 0);
        assert_eq!(command.into_collection().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_batch_falls_back_to_looped_retrieves() {
        let backend = MockBackend::new("solr")
            .with_record("a", json!({}))
            .with_record("b", json!({}));
        let mut command = RetrieveBatchCommand::new(
            "solr",
            vec!["a".to_string(), "b".to_string(), "gone".to_string()],
            ParamBag::new(),
        );
        command.execute(&backend).await.unwrap();
        assert_eq!(backend.batch_calls(), 0);
        assert_eq!(backend.retrieve_calls(), 3);
        let collection = command.into_collection().unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.total(), 2);
    }
}
