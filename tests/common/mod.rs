//! Common test utilities for query session testing
//!
//! Provides a backend wrapper that counts calls and can delay responses,
//! plus seeded fixtures.

use async_trait::async_trait;
use es_query_session::backend::{InMemoryBackend, SearchBackend};
use es_query_session::error::Result;
use es_query_session::models::{BulkOperation, BulkResponse, SearchResponse, WriteOutcome};
use es_query_session::search::CompiledQuery;
use es_query_session::QuerySession;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory backend that records every call it receives
#[derive(Clone, Default)]
pub struct RecordingBackend {
    pub inner: InMemoryBackend,
    calls: Arc<AtomicUsize>,
    queries: Arc<Mutex<Vec<CompiledQuery>>>,
    delay: Option<Duration>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `delay` before answering
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Backend calls received, pings excluded
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Last compiled query passed to `search`
    pub fn last_query(&self) -> Option<CompiledQuery> {
        self.queries.lock().unwrap().last().cloned()
    }

    pub fn session(&self) -> QuerySession {
        QuerySession::new(Arc::new(self.clone()))
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SearchBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    async fn ping(&self) -> bool {
        self.inner.ping().await
    }

    async fn search(&self, index: &str, query: &CompiledQuery) -> Result<SearchResponse> {
        self.queries.lock().unwrap().push(query.clone());
        self.enter().await;
        self.inner.search(index, query).await
    }

    async fn delete(&self, index: &str, id: &str) -> Result<WriteOutcome> {
        self.enter().await;
        self.inner.delete(index, id).await
    }

    async fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse> {
        self.enter().await;
        self.inner.bulk(operations).await
    }

    async fn upsert(&self, index: &str, id: &str, document: &Value) -> Result<WriteOutcome> {
        self.enter().await;
        self.inner.upsert(index, id, document).await
    }
}

fn product(name: &str, category: &str, shop_id: u32, price: f64, lat: f64, lon: f64) -> Value {
    json!({
        "name": name,
        "category": category,
        "shop_id": shop_id,
        "price": price,
        "location": { "lat": lat, "lon": lon }
    })
}

/// Product catalogue used across session tests
pub fn products() -> Vec<(&'static str, Value)> {
    vec![
        ("p1", product("Green tea", "tea", 1, 4.5, 22.54, 114.06)),
        ("p2", product("Black tea", "tea", 1, 3.0, 22.60, 114.10)),
        ("p3", product("Jasmine tea", "tea", 2, 6.0, 23.13, 113.26)),
        ("p4", product("Espresso", "coffee", 2, 2.5, 22.55, 114.05)),
        ("p5", product("Latte", "coffee", 3, 3.5, 39.90, 116.40)),
    ]
}

/// Backend seeded with [`products`] under `index`
pub async fn seeded_backend(index: &str) -> RecordingBackend {
    let backend = RecordingBackend::new();
    for (id, doc) in products() {
        backend.inner.upsert(index, id, &doc).await.unwrap();
    }
    backend
}
