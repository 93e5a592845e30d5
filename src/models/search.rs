use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A single search result hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Index the document lives in
    #[serde(rename = "_index", default)]
    pub index: String,

    /// Document ID
    #[serde(rename = "_id")]
    pub id: String,

    /// Relevance score (absent when sorting by field)
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,

    /// Stored document
    #[serde(rename = "_source", default)]
    pub source: Value,

    /// Sort values of this hit, one per sort directive
    #[serde(default)]
    pub sort: Vec<Value>,

    /// Inner-hit groups by name (collapse)
    #[serde(default)]
    pub inner_hits: HashMap<String, InnerHitGroup>,
}

impl SearchHit {
    /// Deserialize the stored document
    pub fn document<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.source.clone())?)
    }

    /// Inner-hit group by name
    pub fn inner_hit(&self, name: &str) -> Option<&InnerHitGroup> {
        self.inner_hits.get(name)
    }
}

/// Documents retained for one collapse group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawHits", into = "RawHits")]
pub struct InnerHitGroup {
    /// Documents in the group (before the inner-hit size limit)
    pub total_hits: u64,

    pub hits: Vec<SearchHit>,
}

/// Search response with results and metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSearchResponse", into = "RawSearchResponse")]
pub struct SearchResponse {
    /// Search results
    pub hits: Vec<SearchHit>,

    /// Total number of matching documents (before pagination)
    pub total_hits: u64,

    pub max_score: Option<f64>,

    /// Backend execution time in milliseconds
    pub took_ms: u64,

    pub timed_out: bool,
}

impl SearchResponse {
    /// Deserialize every hit's stored document
    pub fn documents<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.hits.iter().map(SearchHit::document).collect()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// `hits.total` is an object since Elasticsearch 7 and a bare number before
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RawTotal {
    Count(u64),
    Object { value: u64 },
}

impl RawTotal {
    fn value(&self) -> u64 {
        match self {
            RawTotal::Count(value) | RawTotal::Object { value } => *value,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawHitsBody {
    #[serde(default)]
    total: Option<RawTotal>,
    #[serde(default)]
    max_score: Option<f64>,
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawHits {
    hits: RawHitsBody,
}

impl From<RawHits> for InnerHitGroup {
    fn from(raw: RawHits) -> Self {
        let total_hits = raw
            .hits
            .total
            .map(|t| t.value())
            .unwrap_or(raw.hits.hits.len() as u64);

        Self {
            total_hits,
            hits: raw.hits.hits,
        }
    }
}

impl From<InnerHitGroup> for RawHits {
    fn from(group: InnerHitGroup) -> Self {
        Self {
            hits: RawHitsBody {
                total: Some(RawTotal::Object {
                    value: group.total_hits,
                }),
                max_score: None,
                hits: group.hits,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawSearchResponse {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    timed_out: bool,
    hits: RawHitsBody,
}

impl From<RawSearchResponse> for SearchResponse {
    fn from(raw: RawSearchResponse) -> Self {
        let total_hits = raw
            .hits
            .total
            .map(|t| t.value())
            .unwrap_or(raw.hits.hits.len() as u64);

        Self {
            hits: raw.hits.hits,
            total_hits,
            max_score: raw.hits.max_score,
            took_ms: raw.took,
            timed_out: raw.timed_out,
        }
    }
}

impl From<SearchResponse> for RawSearchResponse {
    fn from(response: SearchResponse) -> Self {
        Self {
            took: response.took_ms,
            timed_out: response.timed_out,
            hits: RawHitsBody {
                total: Some(RawTotal::Object {
                    value: response.total_hits,
                }),
                max_score: response.max_score,
                hits: response.hits,
            },
        }
    }
}
