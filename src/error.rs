//! Error types for the search federation layer

use thiserror::Error;

/// Result type alias using the federation layer's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Tag attached to a backend error whose reason text indicates a
/// query-syntax failure rather than a server-side fault.
pub const PARSER_ERROR: &str = "parser_error";

/// Federation error taxonomy
///
/// A hard failure is never downgraded to an empty result; zero records
/// means the backend genuinely reported zero.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested backend identifier has no registered adapter.
    /// Fatal to the caller, never retried.
    #[error("Backend '{0}' is not registered with the search service")]
    BackendNotFound(String),

    /// A command was executed against a backend lacking the required
    /// capability interface. Fatal to that call.
    #[error("Backend '{backend}' does not support operation '{operation}'")]
    UnsupportedOperation { backend: String, operation: String },

    /// Transport/protocol failure wrapped in a taggable envelope.
    /// Always emitted as an `error` event before being re-thrown.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The cache/fallback chain found nothing and the caller did not
    /// tolerate missing records. Recoverable; callers commonly catch
    /// this per-id and substitute a placeholder.
    ///
    /// The field is `source_id` rather than `source` so the derive does
    /// not mistake it for an underlying error cause.
    #[error("Record '{id}' from source '{source_id}' does not exist")]
    RecordMissing { source_id: String, id: String },

    /// A collection factory received a malformed raw response.
    /// Fatal, not retried, since retrying would resend the same payload.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a `RecordMissing` error for the given source/id pair
    pub fn record_missing(source: impl Into<String>, id: impl Into<String>) -> Self {
        Self::RecordMissing {
            source_id: source.into(),
            id: id.into(),
        }
    }

    /// Build an `UnsupportedOperation` error for the given backend/operation
    pub fn unsupported(backend: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            backend: backend.into(),
            operation: operation.into(),
        }
    }
}

/// A failure reported by a backend transport or protocol layer
///
/// Carries the HTTP status when one was received, the reason phrase or
/// error body text, and a set of tags that error listeners may attach
/// (e.g. [`PARSER_ERROR`]). Tags never alter propagation; they only let
/// downstream layers classify the failure.
#[derive(Error, Debug)]
#[error("Backend request failed: {reason}")]
pub struct BackendError {
    /// HTTP status code, when the failure happened at the HTTP layer
    pub status: Option<u16>,
    /// Reason phrase or error body text from the transport
    pub reason: String,
    tags: Vec<String>,
}

impl BackendError {
    /// Create a backend error from a reason string
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            status: None,
            reason: reason.into(),
            tags: Vec::new(),
        }
    }

    /// Create a backend error carrying an HTTP status
    pub fn with_status(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            reason: reason.into(),
            tags: Vec::new(),
        }
    }

    /// Attach a classification tag (idempotent)
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.iter().any(|t| t == &tag) {
            self.tags.push(tag);
        }
    }

    /// Whether the given tag has been attached
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// All attached tags, in attachment order
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            reason: err.to_string(),
            tags: Vec::new(),
        }
    }
}
