//! Filter predicates and their query DSL rendering

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A single matching condition evaluated against documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Matches every document
    MatchAll,

    /// Single-field text match against one value
    Match { field: String, value: Value },

    /// Single-field set membership (SQL `IN`)
    Terms { field: String, values: Vec<Value> },

    /// Weighted wrapper; `exact_match` turns the inner predicate into a
    /// constant-score filter
    Boosted {
        inner: Box<Predicate>,
        weight: Option<f64>,
        exact_match: bool,
    },
}

impl Predicate {
    pub fn match_all() -> Self {
        Self::MatchAll
    }

    /// Create a match predicate
    pub fn matches(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Match {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a terms predicate
    pub fn terms<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Pick the predicate variant from the number of values: none matches
    /// everything, one is a match, several are a terms set.
    pub fn from_values(field: impl Into<String>, mut values: Vec<Value>) -> Self {
        match values.len() {
            0 => Self::MatchAll,
            1 => Self::Match {
                field: field.into(),
                value: values.remove(0),
            },
            _ => Self::Terms {
                field: field.into(),
                values,
            },
        }
    }

    /// Disable TF/IDF scoring for this predicate
    pub fn constant_score(self) -> Self {
        match self {
            Self::Boosted {
                inner,
                weight,
                exact_match: _,
            } => Self::Boosted {
                inner,
                weight,
                exact_match: true,
            },
            other => Self::Boosted {
                inner: Box::new(other),
                weight: None,
                exact_match: true,
            },
        }
    }

    /// Multiply the relevance contribution by `weight`.
    ///
    /// Only match and boosted predicates accept a weight; any other variant is
    /// returned unchanged.
    pub fn boost(self, weight: f64) -> Self {
        match self {
            Self::Match { .. } => Self::Boosted {
                inner: Box::new(self),
                weight: Some(weight),
                exact_match: false,
            },
            Self::Boosted {
                inner, exact_match, ..
            } => Self::Boosted {
                inner,
                weight: Some(weight),
                exact_match,
            },
            other => {
                tracing::debug!(predicate = other.kind(), weight, "Boost ignored for predicate");
                other
            }
        }
    }

    /// Short variant name, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MatchAll => "match_all",
            Self::Match { .. } => "match",
            Self::Terms { .. } => "terms",
            Self::Boosted {
                exact_match: true, ..
            } => "constant_score",
            Self::Boosted { .. } => "boosted",
        }
    }

    /// Render as an Elasticsearch query clause
    pub fn to_json(&self) -> Value {
        match self {
            Self::MatchAll => json!({ "match_all": {} }),
            Self::Match { field, value } => match_clause(field, value, None),
            Self::Terms { field, values } => {
                keyed("terms", keyed(field, Value::Array(values.clone())))
            }
            Self::Boosted {
                inner,
                weight,
                exact_match: true,
            } => {
                let mut body = Map::new();
                body.insert("filter".to_string(), inner.to_json());
                if let Some(weight) = weight {
                    body.insert("boost".to_string(), json!(weight));
                }
                keyed("constant_score", Value::Object(body))
            }
            Self::Boosted {
                inner,
                weight,
                exact_match: false,
            } => match (inner.as_ref(), weight) {
                (inner, None) => inner.to_json(),
                (Self::Match { field, value }, Some(weight)) => {
                    match_clause(field, value, Some(*weight))
                }
                (inner, Some(weight)) => json!({
                    "bool": { "must": [inner.to_json()], "boost": weight }
                }),
            },
        }
    }
}

fn match_clause(field: &str, value: &Value, boost: Option<f64>) -> Value {
    let mut options = Map::new();
    options.insert("query".to_string(), value.clone());
    if let Some(boost) = boost {
        options.insert("boost".to_string(), json!(boost));
    }
    keyed("match", keyed(field, Value::Object(options)))
}

/// Single-entry JSON object
pub(crate) fn keyed(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}
