pub mod cache;
pub mod http;
pub mod memory;

pub use cache::{shared_backend, ConnectionCache, GLOBAL_CONNECTION_CACHE};
pub use http::HttpBackend;
/// Development double; see [`memory`]
pub use memory::InMemoryBackend;

use crate::error::Result;
use crate::models::{BulkOperation, BulkResponse, SearchResponse, WriteOutcome};
use crate::search::CompiledQuery;
use async_trait::async_trait;
use serde_json::Value;

/// Capability offered by a search service.
///
/// Implementations must be safe to share across concurrently running
/// sessions. Every call is a single round trip; writes and deletes return
/// only once the change is visible to subsequent searches.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Health check used to decide whether a cached connection is reusable
    async fn ping(&self) -> bool;

    /// Execute a compiled query. Failures are reported as `EsError::Search`.
    async fn search(&self, index: &str, query: &CompiledQuery) -> Result<SearchResponse>;

    /// Delete a document and report the backend's `result`
    /// (`deleted`, `not_found`, ...).
    async fn delete(&self, index: &str, id: &str) -> Result<WriteOutcome>;

    /// Execute a non-empty batch of operations
    async fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse>;

    /// Create or fully replace a document
    async fn upsert(&self, index: &str, id: &str, document: &Value) -> Result<WriteOutcome>;
}
