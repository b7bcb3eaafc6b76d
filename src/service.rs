//! Search service: backend resolution and command dispatch
//!
//! The service resolves a backend by identifier, wraps every command
//! execution in the `pre` → execute → `post`|`error` event sequence, and
//! hands the populated command back. It holds no per-call mutable state;
//! side effects are confined to the event listeners.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::Backend;
use crate::command::{
    Command, RetrieveBatchCommand, RetrieveCommand, SearchCommand,
};
use crate::error::{Error, Result};
use crate::event::{EventBus, SEARCH_TOPIC, SearchEvent};
use crate::params::ParamBag;
use crate::query::Query;
use crate::response::RecordCollection;

/// Dispatcher routing commands to registered backends
#[derive(Default)]
pub struct SearchService {
    backends: HashMap<String, Arc<dyn Backend>>,
    bus: EventBus,
}

impl SearchService {
    /// Create a service with no backends and no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under its own identifier
    pub fn register_backend(&mut self, backend: Arc<dyn Backend>) {
        self.backends
            .insert(backend.identifier().to_string(), backend);
    }

    /// The event bus, for attaching listeners at wiring time
    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// Look up a registered backend
    pub fn backend(&self, backend_id: &str) -> Option<Arc<dyn Backend>> {
        self.backends.get(backend_id).cloned()
    }

    /// Execute a command against its target backend
    ///
    /// Emits `pre` before execution (listeners may rewrite the command's
    /// params in place), then either `post` with the result attached or
    /// `error` with the taggable backend error before re-throwing it.
    /// A failure is never swallowed; the command is returned only on
    /// success, with its result slot populated.
    pub async fn invoke<C: Command>(&self, mut command: C) -> Result<C> {
        let backend_id = command.backend_id().to_string();
        let context = command.context();
        let backend = self
            .backends
            .get(&backend_id)
            .cloned()
            .ok_or_else(|| Error::BackendNotFound(backend_id.clone()))?;

        debug!(backend = %backend_id, context, "dispatching command");
        {
            let mut event = SearchEvent::Pre {
                backend_id: &backend_id,
                context,
                params: command.params_mut(),
            };
            self.bus.emit(SEARCH_TOPIC, &mut event);
        }

        match command.execute(backend.as_ref()).await {
            Ok(()) => {
                {
                    let Some(result) = command.result() else {
                        return Err(Error::InvalidResponse(
                            "command completed without a result".to_string(),
                        ));
                    };
                    let mut event = SearchEvent::Post {
                        backend_id: &backend_id,
                        context,
                        params: command.params(),
                        result,
                    };
                    self.bus.emit(SEARCH_TOPIC, &mut event);
                }
                debug!(backend = %backend_id, context, "command completed");
                Ok(command)
            }
            Err(Error::Backend(mut backend_error)) => {
                warn!(
                    backend = %backend_id,
                    context,
                    reason = %backend_error.reason,
                    "backend call failed"
                );
                {
                    let mut event = SearchEvent::Error {
                        backend_id: &backend_id,
                        context,
                        params: command.params(),
                        error: &mut backend_error,
                    };
                    self.bus.emit(SEARCH_TOPIC, &mut event);
                }
                Err(backend_error.into())
            }
            Err(other) => Err(other),
        }
    }

    /// Build and invoke a search command, returning its collection
    pub async fn search(
        &self,
        backend_id: &str,
        query: Query,
        offset: u64,
        limit: u64,
        params: ParamBag,
    ) -> Result<RecordCollection> {
        let command = SearchCommand::new(backend_id, query, offset, limit, params);
        let command = self.invoke(command).await?;
        command.into_collection().ok_or_else(|| {
            Error::InvalidResponse("search command completed without a collection".to_string())
        })
    }

    /// Build and invoke a retrieve command, returning its collection
    pub async fn retrieve(
        &self,
        backend_id: &str,
        id: &str,
        params: ParamBag,
    ) -> Result<RecordCollection> {
        let command = RetrieveCommand::new(backend_id, id, params);
        let command = self.invoke(command).await?;
        command.into_collection().ok_or_else(|| {
            Error::InvalidResponse("retrieve command completed without a collection".to_string())
        })
    }

    /// Build and invoke a batch retrieve command, returning its collection
    pub async fn retrieve_batch(
        &self,
        backend_id: &str,
        ids: Vec<String>,
        params: ParamBag,
    ) -> Result<RecordCollection> {
        let command = RetrieveBatchCommand::new(backend_id, ids, params);
        let command = self.invoke(command).await?;
        command.into_collection().ok_or_else(|| {
            Error::InvalidResponse(
                "batch retrieve command completed without a collection".to_string(),
            )
        })
    }
}
