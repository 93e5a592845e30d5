//! In-process search backend evaluating compiled queries over JSON documents
//!
//! This is a development double for tests and local runs, not part of the
//! query path: production sessions delegate matching and ranking to the
//! search service through [`HttpBackend`](crate::backend::HttpBackend). Its
//! scoring is a token-count approximation, only precise enough to order
//! results in tests.

use crate::backend::SearchBackend;
use crate::error::Result;
use crate::models::{
    BulkItem, BulkItemError, BulkOperation, BulkResponse, InnerHitGroup, SearchHit,
    SearchResponse, WriteOutcome,
};
use crate::search::{BoolQuery, CompiledQuery, GeoPoint, Predicate, SortOrder, SortSpec};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
struct StoredDocument {
    source: Value,
    version: u64,
}

/// In-memory search backend
#[derive(Clone)]
pub struct InMemoryBackend {
    indices: Arc<DashMap<String, BTreeMap<String, StoredDocument>>>,
    alive: Arc<AtomicBool>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            indices: Arc::new(DashMap::new()),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Control the ping result (simulates an unhealthy backend)
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, AtomicOrdering::SeqCst);
    }

    /// Number of documents in an index
    pub fn count(&self, index: &str) -> usize {
        self.indices.get(index).map(|docs| docs.len()).unwrap_or(0)
    }

    /// Stored document by id
    pub fn get(&self, index: &str, id: &str) -> Option<Value> {
        self.indices
            .get(index)
            .and_then(|docs| docs.get(id).map(|doc| doc.source.clone()))
    }

    fn put(&self, index: &str, id: &str, source: Value) -> WriteOutcome {
        let mut docs = self.indices.entry(index.to_string()).or_default();
        let (result, version) = match docs.get(id) {
            Some(existing) => ("updated", existing.version + 1),
            None => ("created", 1),
        };
        docs.insert(id.to_string(), StoredDocument { source, version });

        WriteOutcome {
            index: index.to_string(),
            id: id.to_string(),
            version: Some(version),
            result: result.to_string(),
        }
    }

    fn remove(&self, index: &str, id: &str) -> WriteOutcome {
        let removed = self
            .indices
            .get_mut(index)
            .and_then(|mut docs| docs.remove(id));

        WriteOutcome {
            index: index.to_string(),
            id: id.to_string(),
            version: removed.as_ref().map(|doc| doc.version + 1),
            result: if removed.is_some() { "deleted" } else { "not_found" }.to_string(),
        }
    }

    fn merge(&self, index: &str, id: &str, partial: &Value) -> Option<WriteOutcome> {
        let mut docs = self.indices.get_mut(index)?;
        let doc = docs.get_mut(id)?;

        match (&mut doc.source, partial) {
            (Value::Object(target), Value::Object(fields)) => {
                for (key, value) in fields {
                    target.insert(key.clone(), value.clone());
                }
            }
            (target, replacement) => *target = replacement.clone(),
        }
        doc.version += 1;

        Some(WriteOutcome {
            index: index.to_string(),
            id: id.to_string(),
            version: Some(doc.version),
            result: "updated".to_string(),
        })
    }

    fn apply(&self, operation: &BulkOperation) -> BulkItem {
        let (index, id) = operation.target();
        let item = |status: u16, result: Option<String>, error: Option<BulkItemError>| BulkItem {
            action: operation.action().to_string(),
            index: index.to_string(),
            id: id.to_string(),
            status,
            result,
            error,
        };

        match operation {
            BulkOperation::Index { document, .. } => {
                let outcome = self.put(index, id, document.clone());
                let status = if outcome.result == "created" { 201 } else { 200 };
                item(status, Some(outcome.result), None)
            }
            BulkOperation::Update { document, .. } => match self.merge(index, id, document) {
                Some(outcome) => item(200, Some(outcome.result), None),
                None => item(
                    404,
                    None,
                    Some(BulkItemError {
                        kind: "document_missing_exception".to_string(),
                        reason: format!("[{}]: document missing", id),
                    }),
                ),
            },
            BulkOperation::Delete { .. } => {
                let outcome = self.remove(index, id);
                let status = if outcome.result == "deleted" { 200 } else { 404 };
                item(status, Some(outcome.result), None)
            }
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ping(&self) -> bool {
        self.alive.load(AtomicOrdering::SeqCst)
    }

    async fn search(&self, index: &str, query: &CompiledQuery) -> Result<SearchResponse> {
        let start = Instant::now();

        let mut matched: Vec<Candidate> = match self.indices.get(index) {
            Some(docs) => docs
                .iter()
                .filter_map(|(id, doc)| {
                    score_bool(&query.query, &doc.source).map(|score| Candidate {
                        id: id.clone(),
                        score,
                        source: doc.source.clone(),
                    })
                })
                .collect(),
            None => Vec::new(),
        };
        let total_hits = matched.len() as u64;
        let max_score = matched.iter().map(|c| c.score).reduce(f64::max);

        sort_candidates(&mut matched, &query.sort);

        let mut hits: Vec<SearchHit> = match query.collapse {
            Some(ref collapse) => {
                let mut groups: Vec<(String, Vec<Candidate>)> = Vec::new();
                let mut positions: HashMap<String, usize> = HashMap::new();
                for candidate in matched {
                    let key = collapse_key(&candidate.source, &collapse.field);
                    match positions.get(&key) {
                        Some(&pos) => groups[pos].1.push(candidate),
                        None => {
                            positions.insert(key.clone(), groups.len());
                            groups.push((key, vec![candidate]));
                        }
                    }
                }

                groups
                    .into_iter()
                    .map(|(_, mut members)| {
                        let mut hit = to_hit(index, &members[0], &query.sort);
                        let group_total = members.len() as u64;
                        sort_candidates(&mut members, &collapse.inner_hit.sort);
                        let inner: Vec<SearchHit> = members
                            .iter()
                            .take(collapse.inner_hit.size)
                            .map(|member| to_hit(index, member, &collapse.inner_hit.sort))
                            .collect();
                        hit.inner_hits.insert(
                            collapse.inner_hit.name.clone(),
                            InnerHitGroup {
                                total_hits: group_total,
                                hits: inner,
                            },
                        );
                        hit
                    })
                    .collect()
            }
            None => matched
                .iter()
                .map(|candidate| to_hit(index, candidate, &query.sort))
                .collect(),
        };

        let offset = query.pagination.offset() as usize;
        let size = query.pagination.page_size() as usize;
        hits = hits.into_iter().skip(offset).take(size).collect();

        Ok(SearchResponse {
            hits,
            total_hits,
            max_score,
            took_ms: start.elapsed().as_millis() as u64,
            timed_out: false,
        })
    }

    async fn delete(&self, index: &str, id: &str) -> Result<WriteOutcome> {
        Ok(self.remove(index, id))
    }

    async fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse> {
        let start = Instant::now();
        let items: Vec<BulkItem> = operations.iter().map(|op| self.apply(op)).collect();

        Ok(BulkResponse {
            took_ms: start.elapsed().as_millis() as u64,
            errors: items.iter().any(|item| item.error.is_some()),
            items,
        })
    }

    async fn upsert(&self, index: &str, id: &str, document: &Value) -> Result<WriteOutcome> {
        Ok(self.put(index, id, document.clone()))
    }
}

struct Candidate {
    id: String,
    score: f64,
    source: Value,
}

fn to_hit(index: &str, candidate: &Candidate, sort: &[SortSpec]) -> SearchHit {
    SearchHit {
        index: index.to_string(),
        id: candidate.id.clone(),
        // Field sorts do not track scores
        score: if sort.is_empty() {
            Some(candidate.score)
        } else {
            None
        },
        source: candidate.source.clone(),
        sort: sort
            .iter()
            .map(|spec| match sort_key(candidate, spec) {
                Some(SortKey::Number(n)) => Value::from(n),
                Some(SortKey::Text(s)) => Value::from(s),
                None => Value::Null,
            })
            .collect(),
        inner_hits: HashMap::new(),
    }
}

/// Score of a document against the boolean query, `None` when it does not match.
///
/// Every must clause has to match. Should clauses are required only when there
/// is no must clause; otherwise they add to the score.
fn score_bool(query: &BoolQuery, doc: &Value) -> Option<f64> {
    if query.must.is_empty() && query.should.is_empty() {
        return Some(1.0);
    }

    let mut score = 0.0;
    for predicate in &query.must {
        score += score_predicate(predicate, doc)?;
    }

    let mut should_matches = 0;
    for predicate in &query.should {
        if let Some(s) = score_predicate(predicate, doc) {
            score += s;
            should_matches += 1;
        }
    }
    if query.must.is_empty() && should_matches == 0 {
        return None;
    }

    Some(score)
}

fn score_predicate(predicate: &Predicate, doc: &Value) -> Option<f64> {
    match predicate {
        Predicate::MatchAll => Some(1.0),
        Predicate::Match { field, value } => {
            let values = field_values(doc, field);
            match value {
                Value::String(text) => {
                    let terms = tokenize(text);
                    let indexed: Vec<String> = values
                        .iter()
                        .filter_map(|v| scalar_text(v))
                        .flat_map(|v| tokenize(&v))
                        .collect();
                    let hits = terms.iter().filter(|t| indexed.contains(t)).count();
                    if hits == 0 {
                        None
                    } else {
                        Some(hits as f64)
                    }
                }
                other => values
                    .iter()
                    .any(|v| scalar_eq(v, other))
                    .then_some(1.0),
            }
        }
        Predicate::Terms { field, values } => {
            let stored = field_values(doc, field);
            stored
                .iter()
                .any(|s| values.iter().any(|v| scalar_eq(s, v)))
                .then_some(1.0)
        }
        Predicate::Boosted {
            inner,
            weight,
            exact_match,
        } => {
            let score = score_predicate(inner, doc)?;
            let weight = weight.unwrap_or(1.0);
            if *exact_match {
                Some(weight)
            } else {
                Some(score * weight)
            }
        }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Keyword equality; numbers and their string form compare equal
fn scalar_eq(stored: &Value, wanted: &Value) -> bool {
    if stored == wanted {
        return true;
    }
    match (stored, wanted) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => match (scalar_text(stored), scalar_text(wanted)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

/// Raw field value; dotted names address nested objects
fn raw_field<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(value) = doc.get(path) {
        return Some(value);
    }
    path.split('.').try_fold(doc, |current, part| current.get(part))
}

/// Scalar values of a field, arrays flattened
fn field_values<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    fn flatten<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
        match value {
            Value::Array(items) => items.iter().for_each(|item| flatten(item, out)),
            Value::Null => {}
            other => out.push(other),
        }
    }

    let mut out = Vec::new();
    if let Some(value) = raw_field(doc, path) {
        flatten(value, &mut out);
    }
    out
}

fn geo_value(value: &Value) -> Option<GeoPoint> {
    match value {
        Value::Object(_) => {
            GeoPoint::new(value.get("lat")?.as_f64()?, value.get("lon")?.as_f64()?).ok()
        }
        Value::String(s) => s.parse().ok(),
        // GeoJSON order: [lon, lat]
        Value::Array(items) if items.len() == 2 && items.iter().all(Value::is_number) => {
            GeoPoint::new(items[1].as_f64()?, items[0].as_f64()?).ok()
        }
        Value::Array(items) => items.first().and_then(geo_value),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Number(f64),
    Text(String),
}

impl SortKey {
    fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
            (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
        }
    }
}

fn sort_key(candidate: &Candidate, spec: &SortSpec) -> Option<SortKey> {
    match spec {
        SortSpec::Field { field, .. } => match field.as_str() {
            "_score" => Some(SortKey::Number(candidate.score)),
            "_id" => Some(SortKey::Text(candidate.id.clone())),
            _ => field_values(&candidate.source, field)
                .first()
                .and_then(|value| match value {
                    Value::Number(n) => n.as_f64().map(SortKey::Number),
                    Value::String(s) => Some(SortKey::Text(s.clone())),
                    Value::Bool(b) => Some(SortKey::Number(if *b { 1.0 } else { 0.0 })),
                    _ => None,
                }),
        },
        SortSpec::GeoDistance {
            field,
            origin,
            unit,
            ..
        } => raw_field(&candidate.source, field)
            .and_then(geo_value)
            .map(|point| SortKey::Number(origin.distance_meters(&point) / unit.meters())),
    }
}

/// Sort by the given directives (missing values last), by descending score
/// when there are none; ties are broken by id.
fn sort_candidates(candidates: &mut [Candidate], sort: &[SortSpec]) {
    candidates.sort_by(|a, b| {
        if sort.is_empty() {
            return b
                .score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id));
        }

        for spec in sort {
            let ordering = match (sort_key(a, spec), sort_key(b, spec)) {
                (Some(x), Some(y)) => match spec.order() {
                    SortOrder::Ascending => x.compare(&y),
                    SortOrder::Descending => y.compare(&x),
                },
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.id.cmp(&b.id)
    });
}

fn collapse_key(doc: &Value, field: &str) -> String {
    field_values(doc, field)
        .first()
        .and_then(|value| scalar_text(value))
        .unwrap_or_default()
}
