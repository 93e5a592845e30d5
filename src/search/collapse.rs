//! Field collapsing with inner hits

use crate::search::sort::SortSpec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Representative documents kept per collapse group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InnerHit {
    /// Label of the inner-hit group in the response
    pub name: String,

    /// Maximum documents kept per group
    pub size: usize,

    /// Ordering within each group, independent of the outer sort
    pub sort: Vec<SortSpec>,
}

/// Collapse directive: one top-level hit per distinct field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollapseSpec {
    pub field: String,
    pub inner_hit: InnerHit,
}

impl CollapseSpec {
    pub fn new(inner_hit_name: impl Into<String>, field: impl Into<String>, size: usize) -> Self {
        Self {
            field: field.into(),
            inner_hit: InnerHit {
                name: inner_hit_name.into(),
                size,
                sort: Vec::new(),
            },
        }
    }

    /// Set the ordering applied inside each group
    pub fn with_sort(mut self, sort: Vec<SortSpec>) -> Self {
        self.inner_hit.sort = sort;
        self
    }

    /// Render as an Elasticsearch collapse clause
    pub fn to_json(&self) -> Value {
        let mut inner_hits = json!({
            "name": self.inner_hit.name,
            "size": self.inner_hit.size,
        });
        if !self.inner_hit.sort.is_empty() {
            inner_hits["sort"] =
                Value::Array(self.inner_hit.sort.iter().map(SortSpec::to_json).collect());
        }

        json!({
            "field": self.field,
            "inner_hits": inner_hits,
        })
    }
}
