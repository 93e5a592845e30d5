//! Fluent query sessions for Elasticsearch
//!
//! Build a bool query clause by clause, add sorting, field collapsing and a
//! deadline, then run one terminal operation (search, delete, bulk or save)
//! against a backend reached through a process-wide cached connection.

pub mod backend;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod search;

pub use backend::{HttpBackend, SearchBackend};
pub use config::{ConfigSource, EsConfig};
pub use error::{EsError, Result, ERROR_PREFIX};
pub use search::{DistanceUnit, OptionalOptions, Predicate, QuerySession, SortSpec};
