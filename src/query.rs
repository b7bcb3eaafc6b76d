//! Immutable search query representation
//!
//! A [`Query`] binds a search expression to a field handler alias. It
//! carries no backend syntax; each backend's query builder translates
//! the handler alias into that engine's native field expression.

use serde::{Deserialize, Serialize};

/// Handler alias used when the caller does not scope the search
pub const ALL_FIELDS: &str = "AllFields";

/// An immutable search expression bound to a field handler alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    expression: String,
    handler: String,
}

impl Query {
    /// Create a query against the default `AllFields` handler
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            handler: ALL_FIELDS.to_string(),
        }
    }

    /// Create a query scoped to a specific handler alias
    pub fn with_handler(expression: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            handler: handler.into(),
        }
    }

    /// The search expression
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The handler alias this query is scoped to
    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Whether the query targets the unscoped `AllFields` handler
    pub fn is_all_fields(&self) -> bool {
        self.handler == ALL_FIELDS
    }
}
