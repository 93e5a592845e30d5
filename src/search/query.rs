//! Composite boolean query and compiled request body

use crate::search::collapse::CollapseSpec;
use crate::search::pagination::Pagination;
use crate::search::predicate::Predicate;
use crate::search::sort::SortSpec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Composite boolean query: `must` clauses are ANDed, `should` clauses ORed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoolQuery {
    pub must: Vec<Predicate>,
    pub should: Vec<Predicate>,
}

impl BoolQuery {
    pub fn new(must: Vec<Predicate>, should: Vec<Predicate>) -> Self {
        Self { must, should }
    }

    /// True when no clause constrains the result
    pub fn is_match_all(&self) -> bool {
        self.should.is_empty() && self.must.iter().all(|p| matches!(p, Predicate::MatchAll))
    }

    /// Render as an Elasticsearch `bool` query.
    ///
    /// With no clauses the query degrades to `must: [match_all]`.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();

        if self.must.is_empty() && self.should.is_empty() {
            body.insert("must".to_string(), json!([Predicate::MatchAll.to_json()]));
        }
        if !self.must.is_empty() {
            body.insert(
                "must".to_string(),
                Value::Array(self.must.iter().map(Predicate::to_json).collect()),
            );
        }
        if !self.should.is_empty() {
            body.insert(
                "should".to_string(),
                Value::Array(self.should.iter().map(Predicate::to_json).collect()),
            );
        }

        json!({ "bool": body })
    }
}

/// Everything a search needs, compiled from a query session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub query: BoolQuery,
    pub sort: Vec<SortSpec>,
    pub collapse: Option<CollapseSpec>,
    pub pagination: Pagination,
}

impl CompiledQuery {
    /// Render the `_search` request body
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "query": self.query.to_json(),
            "from": self.pagination.offset(),
            "size": self.pagination.page_size(),
        });

        if !self.sort.is_empty() {
            body["sort"] = Value::Array(self.sort.iter().map(SortSpec::to_json).collect());
        }
        if let Some(ref collapse) = self.collapse {
            body["collapse"] = collapse.to_json();
        }

        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bool_is_match_all() {
        let query = BoolQuery::default();
        assert!(query.is_match_all());
        assert_eq!(
            query.to_json(),
            json!({ "bool": { "must": [{ "match_all": {} }] } })
        );
    }

    #[test]
    fn test_must_and_should() {
        let query = BoolQuery::new(
            vec![Predicate::matches("status", "online")],
            vec![Predicate::matches("brand", "acme").boost(2.0)],
        );
        assert!(!query.is_match_all());
        assert_eq!(
            query.to_json(),
            json!({
                "bool": {
                    "must": [{ "match": { "status": { "query": "online" } } }],
                    "should": [{ "match": { "brand": { "query": "acme", "boost": 2.0 } } }]
                }
            })
        );
    }

    #[test]
    fn test_body_without_sort_or_collapse() {
        let compiled = CompiledQuery {
            query: BoolQuery::default(),
            sort: vec![],
            collapse: None,
            pagination: Pagination::new(3, 10),
        };

        let body = compiled.to_body();
        assert_eq!(body["from"], json!(20));
        assert_eq!(body["size"], json!(10));
        assert!(body.get("sort").is_none());
        assert!(body.get("collapse").is_none());
    }
}
