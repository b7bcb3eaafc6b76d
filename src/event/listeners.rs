//! Standard search event listeners
//!
//! - [`RestrictedDataListener`]: injects the authorized username into
//!   the command parameters of one backend before every call, removing
//!   any stale value first so authorization state can never leak
//!   between requests.
//! - [`ParserErrorListener`]: tags backend errors whose reason text
//!   matches an engine version's query-syntax failure phrasing, so the
//!   presentation layer can distinguish "bad query" from "broken
//!   backend".

use std::sync::Arc;

use tracing::debug;

use crate::error::PARSER_ERROR;

use super::{EventBus, EventName, SEARCH_TOPIC, SearchEvent};

/// Parameter carrying the authorized username to the backend
pub const RESTRICTED_USER_PARAM: &str = "restricted_user";

/// Syntax-failure markers emitted by current engine majors
pub const SYNTAX_MARKERS: [&str; 2] = ["org.apache.solr.search.SyntaxError", "undefined field"];

/// Syntax-failure markers emitted by legacy engine majors
pub const LEGACY_SYNTAX_MARKERS: [&str; 2] = [
    "org.apache.lucene.queryParser.ParseException",
    "undefined field",
];

/// Source of the current request's rights-management authorization
pub trait RightsService: Send + Sync {
    /// Username of the session's authorized user, if the session is
    /// authorized to see restricted metadata
    fn authorized_username(&self) -> Option<String>;
}

/// Pre-event listener gating restricted metadata behind authorization
///
/// On every call targeting its backend it removes the restricted-user
/// parameter unconditionally, then re-injects it only when the rights
/// service reports an authorized session. The unconditional removal is
/// correctness-critical: commands can be rebuilt from earlier parameter
/// bags, and a stale username must never ride along into an
/// unauthorized request.
pub struct RestrictedDataListener {
    backend_id: String,
    param: String,
    rights: Arc<dyn RightsService>,
}

impl RestrictedDataListener {
    /// Create a listener for `backend_id` using the default parameter name
    pub fn new(backend_id: impl Into<String>, rights: Arc<dyn RightsService>) -> Self {
        Self {
            backend_id: backend_id.into(),
            param: RESTRICTED_USER_PARAM.to_string(),
            rights,
        }
    }

    /// Override the parameter name the username is carried under
    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = param.into();
        self
    }

    /// Attach this listener to the bus
    pub fn subscribe(self, bus: &mut EventBus, priority: i32) {
        bus.subscribe(SEARCH_TOPIC, EventName::Pre, priority, move |event| {
            let SearchEvent::Pre {
                backend_id, params, ..
            } = event
            else {
                return;
            };
            if *backend_id != self.backend_id {
                return;
            }
            // remove first, on every call, so state never leaks
            params.remove(&self.param);
            if let Some(username) = self.rights.authorized_username() {
                debug!(backend = %self.backend_id, "injecting authorized username");
                params.set(&self.param, username);
            }
        });
    }
}

/// Error-event listener tagging query-syntax failures
///
/// Inspects the wrapped transport error's reason text; when it contains
/// one of a small fixed marker set the error is tagged
/// [`PARSER_ERROR`], otherwise it is left untouched. The listener only
/// attaches the tag; acting on it is the presentation layer's business.
pub struct ParserErrorListener {
    backend_id: String,
    markers: Vec<String>,
}

impl ParserErrorListener {
    /// Listener for the phrasing of current engine majors
    pub fn new(backend_id: impl Into<String>) -> Self {
        Self {
            backend_id: backend_id.into(),
            markers: SYNTAX_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Listener for the phrasing of legacy engine majors
    pub fn legacy(backend_id: impl Into<String>) -> Self {
        Self {
            backend_id: backend_id.into(),
            markers: LEGACY_SYNTAX_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Attach this listener to the bus
    pub fn subscribe(self, bus: &mut EventBus, priority: i32) {
        bus.subscribe(SEARCH_TOPIC, EventName::Error, priority, move |event| {
            let SearchEvent::Error {
                backend_id, error, ..
            } = event
            else {
                return;
            };
            if *backend_id != self.backend_id {
                return;
            }
            if self.markers.iter().any(|m| error.reason.contains(m.as_str())) {
                debug!(backend = %self.backend_id, reason = %error.reason, "tagging parser error");
                error.add_tag(PARSER_ERROR);
            }
        });
    }
}
