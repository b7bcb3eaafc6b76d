//! Fedsearch Core Library
//!
//! Backend-agnostic search federation layer for library discovery,
//! including:
//! - Query and parameter bag model
//! - Uniform record/record-collection abstraction over heterogeneous
//!   backend payloads
//! - Backend adapter contract with capability extensions
//! - Command objects for uniform dispatch
//! - Search service with a pre/post/error event pipeline
//! - Record cache and fallback loader chain
//! - Rate limiter state storage

pub mod backend;
pub mod cache;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod loader;
pub mod params;
pub mod query;
pub mod ratelimit;
pub mod record;
pub mod response;
pub mod service;

#[cfg(test)]
pub(crate) mod test_util;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::FederationConfig;
    pub use crate::error::{Error, Result};
    pub use crate::loader::{RecordLoader, RecordRequest};
    pub use crate::params::ParamBag;
    pub use crate::query::Query;
    pub use crate::record::Record;
    pub use crate::response::RecordCollection;
    pub use crate::service::SearchService;
}
