//! Per-request query session

use crate::backend::{shared_backend, SearchBackend};
use crate::config::{ConfigSource, EsConfig};
use crate::error::{EsError, Result};
use crate::metrics;
use crate::models::{BulkOperation, BulkResponse, SearchResponse, WriteOutcome};
use crate::search::collapse::CollapseSpec;
use crate::search::pagination::Pagination;
use crate::search::predicate::Predicate;
use crate::search::query::{BoolQuery, CompiledQuery};
use crate::search::sort::{DistanceUnit, SortSpec};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Options for optional ("should") clauses
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OptionalOptions {
    /// Ignore TF/IDF: the clause scores a constant
    pub exact_match: bool,

    /// Relevance multiplier
    pub weight: Option<f64>,
}

impl OptionalOptions {
    pub fn exact() -> Self {
        Self {
            exact_match: true,
            weight: None,
        }
    }

    pub fn weighted(weight: f64) -> Self {
        Self {
            exact_match: false,
            weight: Some(weight),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// Accumulates filters, sorting and collapsing for one request, then runs a
/// single terminal operation.
///
/// Setters are cumulative and may be called in any order. Terminal operations
/// (`search`, `delete`, `bulk`, `save`) consume the session.
pub struct QuerySession {
    backend: Arc<dyn SearchBackend>,
    required: Vec<Predicate>,
    optional: Vec<Predicate>,
    sort: Vec<SortSpec>,
    collapse: Option<CollapseSpec>,
    collapse_sort: Vec<SortSpec>,
    deadline: Option<Instant>,
}

impl QuerySession {
    /// Create a session over an existing backend connection
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            required: Vec::new(),
            optional: Vec::new(),
            sort: Vec::new(),
            collapse: None,
            collapse_sort: Vec::new(),
            deadline: None,
        }
    }

    /// Create a session over the process-wide cached connection
    pub async fn connect(config: &EsConfig) -> Result<Self> {
        Ok(Self::new(shared_backend(config).await?))
    }

    /// Resolve the connection settings from `source`, then connect
    pub async fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        let config = EsConfig::from_source(source)?;
        Self::connect(&config).await
    }

    /// Add a required clause on `field`: no values matches everything, one
    /// value is a match, several values are a terms (`IN`) clause
    pub fn add_required<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.add_required_predicate(Predicate::from_values(field, values))
    }

    pub fn add_required_predicate(mut self, predicate: Predicate) -> Self {
        debug!(predicate = predicate.kind(), "Adding required clause");
        self.required.push(predicate);
        self
    }

    /// Add an optional match clause on `field`
    pub fn add_optional(
        self,
        field: impl Into<String>,
        value: impl Into<Value>,
        options: OptionalOptions,
    ) -> Self {
        self.add_optional_predicate(Predicate::matches(field, value), options)
    }

    /// Add an optional clause. `exact_match` wraps the predicate in a
    /// constant-score filter before the weight is applied.
    pub fn add_optional_predicate(
        mut self,
        predicate: Predicate,
        options: OptionalOptions,
    ) -> Self {
        let mut predicate = predicate;
        if options.exact_match {
            predicate = predicate.constant_score();
        }
        if let Some(weight) = options.weight {
            predicate = predicate.boost(weight);
        }

        debug!(predicate = predicate.kind(), "Adding optional clause");
        self.optional.push(predicate);
        self
    }

    /// Sort by a field
    pub fn set_sort(self, field: impl Into<String>, ascending: bool) -> Self {
        self.add_sort(SortSpec::field(field, ascending))
    }

    /// Sort by distance from `lat_lon` (`"lat,lon"`)
    pub fn set_geo_distance_sort(
        self,
        field: impl Into<String>,
        lat_lon: &str,
        unit: DistanceUnit,
        ascending: bool,
    ) -> Result<Self> {
        let spec = SortSpec::geo_distance(field, lat_lon, unit, ascending)?;
        Ok(self.add_sort(spec))
    }

    pub fn add_sort(mut self, spec: SortSpec) -> Self {
        self.sort.push(spec);
        self
    }

    /// Add a sort directive used inside collapse groups by the next
    /// [`set_collapse`](Self::set_collapse)
    pub fn add_collapse_sort(mut self, spec: SortSpec) -> Self {
        self.collapse_sort.push(spec);
        self
    }

    /// Collapse results on `field`, keeping up to `size` documents per group
    /// under `inner_hit_name`. Replaces any previous collapse.
    pub fn set_collapse(
        mut self,
        inner_hit_name: impl Into<String>,
        field: impl Into<String>,
        size: usize,
    ) -> Self {
        let mut collapse = CollapseSpec::new(inner_hit_name, field, size);
        if !self.collapse_sort.is_empty() {
            collapse = collapse.with_sort(self.collapse_sort.clone());
        }

        if self.collapse.is_some() {
            debug!(field = %collapse.field, "Replacing collapse directive");
        }
        self.collapse = Some(collapse);
        self
    }

    /// Abort the terminal operation if the backend has not answered within
    /// `timeout` from now
    pub fn set_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn required(&self) -> &[Predicate] {
        &self.required
    }

    pub fn optional(&self) -> &[Predicate] {
        &self.optional
    }

    pub fn sort(&self) -> &[SortSpec] {
        &self.sort
    }

    pub fn collapse(&self) -> Option<&CollapseSpec> {
        self.collapse.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Compile the accumulated state into a single query
    pub fn compile(&self, page_index: i64, page_size: i64) -> CompiledQuery {
        CompiledQuery {
            query: BoolQuery::new(self.required.clone(), self.optional.clone()),
            sort: self.sort.clone(),
            collapse: self.collapse.clone(),
            pagination: Pagination::new(page_index, page_size),
        }
    }

    /// Search `index`, returning page `page_index` (1-based) of `page_size` hits
    pub async fn search(
        self,
        index: &str,
        page_index: i64,
        page_size: i64,
    ) -> Result<SearchResponse> {
        let compiled = self.compile(page_index, page_size);
        debug!(
            index = %index,
            must = compiled.query.must.len(),
            should = compiled.query.should.len(),
            from = compiled.pagination.offset(),
            size = compiled.pagination.page_size(),
            "Compiled search"
        );

        let result = run(
            "search",
            self.deadline,
            self.backend.search(index, &compiled),
            || EsError::Search("deadline exceeded".to_string()),
        )
        .await;

        match result {
            Ok(response) => {
                debug!(
                    index = %index,
                    total_hits = response.total_hits,
                    returned = response.hits.len(),
                    took_ms = response.took_ms,
                    "Search completed"
                );
                Ok(response)
            }
            Err(e) => {
                error!(index = %index, error = %e, "Search failed");
                Err(e)
            }
        }
    }

    /// Delete a document; returns once the deletion is visible to searches
    pub async fn delete(self, index: &str, id: &str) -> Result<()> {
        let operation = async {
            let outcome = self.backend.delete(index, id).await?;
            delete_result(outcome, index, id)
        };

        let result = run("delete", self.deadline, operation, || {
            EsError::DeletionFailed("deadline exceeded".to_string())
        })
        .await;

        match result {
            Ok(()) => {
                info!(index = %index, id = %id, "Document deleted");
                Ok(())
            }
            Err(e) => {
                warn!(index = %index, id = %id, error = %e, "Delete failed");
                Err(e)
            }
        }
    }

    /// Execute a batch of operations; item failures are reported per item in
    /// the response
    pub async fn bulk(self, operations: Vec<BulkOperation>) -> Result<BulkResponse> {
        if operations.is_empty() {
            return Err(EsError::EmptyBulk);
        }

        let count = operations.len();
        let response = run(
            "bulk",
            self.deadline,
            self.backend.bulk(&operations),
            || EsError::Write("deadline exceeded".to_string()),
        )
        .await
        .map_err(|e| {
            error!(operations = count, error = %e, "Bulk request failed");
            e
        })?;

        if response.errors {
            warn!(
                operations = count,
                failed = response.failed_items().len(),
                "Bulk request completed with item failures"
            );
        } else {
            info!(operations = count, took_ms = response.took_ms, "Bulk request completed");
        }

        Ok(response)
    }

    /// Create or fully replace a document; returns once the write is visible
    /// to searches
    pub async fn save<T: Serialize + ?Sized>(
        self,
        index: &str,
        id: &str,
        document: &T,
    ) -> Result<WriteOutcome> {
        let document = serde_json::to_value(document)?;

        let outcome = run(
            "save",
            self.deadline,
            self.backend.upsert(index, id, &document),
            || EsError::Write("deadline exceeded".to_string()),
        )
        .await
        .map_err(|e| {
            error!(index = %index, id = %id, error = %e, "Save failed");
            e
        })?;

        info!(index = %index, id = %id, result = %outcome.result, "Document saved");
        Ok(outcome)
    }
}

/// Map the backend's delete acknowledgement onto the session result
fn delete_result(outcome: WriteOutcome, index: &str, id: &str) -> Result<()> {
    match outcome.result.as_str() {
        "deleted" => Ok(()),
        "not_found" => Err(EsError::NotFound {
            index: index.to_string(),
            id: id.to_string(),
        }),
        other => Err(EsError::DeletionFailed(format!(
            "unexpected result '{}' for document {}",
            other, id
        ))),
    }
}

/// Await a backend call under the optional deadline and record metrics
async fn run<T, F>(
    operation: &'static str,
    deadline: Option<Instant>,
    call: F,
    on_deadline: impl FnOnce() -> EsError,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let start = std::time::Instant::now();

    let result = match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(on_deadline()),
        },
        None => call.await,
    };

    metrics::record(operation, start.elapsed(), result.as_ref().err().map(EsError::label));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use serde_json::json;

    fn session() -> QuerySession {
        QuerySession::new(Arc::new(InMemoryBackend::new()))
    }

    #[test]
    fn test_empty_session_compiles_to_match_all() {
        let compiled = session().compile(1, 10);
        assert!(compiled.query.is_match_all());
        assert_eq!(
            compiled.to_body()["query"],
            json!({ "bool": { "must": [{ "match_all": {} }] } })
        );
    }

    #[test]
    fn test_required_cardinality() {
        let session = session()
            .add_required("status", Vec::<Value>::new())
            .add_required("city", vec!["Shenzhen"])
            .add_required("shop_id", vec![1, 2, 3]);

        assert_eq!(
            session.required(),
            &[
                Predicate::MatchAll,
                Predicate::matches("city", "Shenzhen"),
                Predicate::terms("shop_id", vec![1, 2, 3]),
            ]
        );
    }

    #[test]
    fn test_optional_options() {
        let session = session()
            .add_optional("brand", "acme", OptionalOptions::default())
            .add_optional("brand", "globex", OptionalOptions::weighted(2.0))
            .add_optional("tag", "organic", OptionalOptions::exact().with_weight(5.0));

        let should = &session.compile(1, 10).query.should;
        assert_eq!(should[0].to_json(), json!({ "match": { "brand": { "query": "acme" } } }));
        assert_eq!(
            should[1].to_json(),
            json!({ "match": { "brand": { "query": "globex", "boost": 2.0 } } })
        );
        assert_eq!(
            should[2].to_json(),
            json!({
                "constant_score": {
                    "filter": { "match": { "tag": { "query": "organic" } } },
                    "boost": 5.0
                }
            })
        );
    }

    #[test]
    fn test_weight_on_terms_is_ignored() {
        let terms = Predicate::terms("tag", vec!["a", "b"]);
        let session =
            session().add_optional_predicate(terms.clone(), OptionalOptions::weighted(3.0));
        assert_eq!(session.optional(), &[terms]);
    }

    #[test]
    fn test_sort_keeps_insertion_order() {
        let session = session()
            .set_sort("score", false)
            .set_geo_distance_sort("location", "22.5,114.0", DistanceUnit::Meters, true)
            .unwrap()
            .set_sort("id", true);

        let body = session.compile(1, 10).to_body();
        let sort = body["sort"].as_array().unwrap();
        assert_eq!(sort.len(), 3);
        assert_eq!(sort[0], json!({ "score": { "order": "desc" } }));
        assert!(sort[1].get("_geo_distance").is_some());
        assert_eq!(sort[2], json!({ "id": { "order": "asc" } }));
    }

    #[test]
    fn test_invalid_geo_point() {
        let err = session()
            .set_geo_distance_sort("location", "somewhere", DistanceUnit::Kilometers, true)
            .err()
            .unwrap();
        assert_eq!(err.error_code(), "INVALID_GEO_POINT");
    }

    #[test]
    fn test_collapse_last_write_wins_and_takes_inner_sort() {
        let session = session()
            .set_collapse("first", "brand", 1)
            .add_collapse_sort(SortSpec::field("price", true))
            .set_collapse("cheapest", "shop_id", 2);

        let collapse = session.collapse().unwrap();
        assert_eq!(collapse.field, "shop_id");
        assert_eq!(collapse.inner_hit.name, "cheapest");
        assert_eq!(collapse.inner_hit.size, 2);
        assert_eq!(collapse.inner_hit.sort, vec![SortSpec::field("price", true)]);
    }

    #[test]
    fn test_compile_does_not_consume_state() {
        let session = session().add_required("city", vec!["Berlin"]);
        let first = session.compile(1, 10);
        let second = session.compile(2, 10);
        assert_eq!(first.query, second.query);
        assert_eq!(second.pagination.offset(), 10);
        assert_eq!(session.required().len(), 1);
    }

    #[tokio::test]
    async fn test_set_timeout_sets_deadline() {
        let before = Instant::now();
        let session = session().set_timeout(Duration::from_secs(5));
        let deadline = session.deadline().unwrap();
        assert!(deadline >= before + Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_empty_bulk() {
        let err = session().bulk(vec![]).await.unwrap_err();
        assert!(matches!(err, EsError::EmptyBulk));
    }
}
