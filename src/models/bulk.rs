use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// One operation of a bulk request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BulkOperation {
    /// Create or fully replace a document
    Index {
        index: String,
        id: String,
        document: Value,
    },

    /// Merge fields into an existing document
    Update {
        index: String,
        id: String,
        document: Value,
    },

    Delete { index: String, id: String },
}

impl BulkOperation {
    pub fn index<T: Serialize>(
        index: impl Into<String>,
        id: impl Into<String>,
        document: &T,
    ) -> Result<Self> {
        Ok(Self::Index {
            index: index.into(),
            id: id.into(),
            document: serde_json::to_value(document)?,
        })
    }

    pub fn update<T: Serialize>(
        index: impl Into<String>,
        id: impl Into<String>,
        document: &T,
    ) -> Result<Self> {
        Ok(Self::Update {
            index: index.into(),
            id: id.into(),
            document: serde_json::to_value(document)?,
        })
    }

    pub fn delete(index: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Delete {
            index: index.into(),
            id: id.into(),
        }
    }

    /// Bulk action name
    pub fn action(&self) -> &'static str {
        match self {
            Self::Index { .. } => "index",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }

    pub fn target(&self) -> (&str, &str) {
        match self {
            Self::Index { index, id, .. }
            | Self::Update { index, id, .. }
            | Self::Delete { index, id } => (index, id),
        }
    }

    /// Append the NDJSON lines of this operation to `out`
    pub fn write_ndjson(&self, out: &mut String) -> Result<()> {
        let (index, id) = self.target();
        let mut header = serde_json::Map::new();
        header.insert(
            self.action().to_string(),
            json!({ "_index": index, "_id": id }),
        );
        out.push_str(&serde_json::to_string(&header)?);
        out.push('\n');

        match self {
            Self::Index { document, .. } => {
                out.push_str(&serde_json::to_string(document)?);
                out.push('\n');
            }
            Self::Update { document, .. } => {
                out.push_str(&serde_json::to_string(&json!({ "doc": document }))?);
                out.push('\n');
            }
            Self::Delete { .. } => {}
        }

        Ok(())
    }
}

/// Error reported for a single bulk item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemError {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub reason: String,
}

/// Outcome of a single bulk item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkItem {
    pub action: String,
    pub index: String,
    pub id: String,
    pub status: u16,
    pub result: Option<String>,
    pub error: Option<BulkItemError>,
}

impl BulkItem {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }
}

/// Bulk response; success is per item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawBulkResponse", into = "RawBulkResponse")]
pub struct BulkResponse {
    pub took_ms: u64,

    /// True when at least one item failed
    pub errors: bool,

    /// Item outcomes in request order
    pub items: Vec<BulkItem>,
}

impl BulkResponse {
    pub fn failed_items(&self) -> Vec<&BulkItem> {
        self.items.iter().filter(|item| !item.is_success()).collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawBulkItem {
    #[serde(rename = "_index", default)]
    index: String,
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(default)]
    status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<BulkItemError>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawBulkResponse {
    #[serde(default)]
    took: u64,
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, RawBulkItem>>,
}

impl From<RawBulkResponse> for BulkResponse {
    fn from(raw: RawBulkResponse) -> Self {
        let items = raw
            .items
            .into_iter()
            .flat_map(|entry| entry.into_iter())
            .map(|(action, item)| BulkItem {
                action,
                index: item.index,
                id: item.id,
                status: item.status,
                result: item.result,
                error: item.error,
            })
            .collect();

        Self {
            took_ms: raw.took,
            errors: raw.errors,
            items,
        }
    }
}

impl From<BulkResponse> for RawBulkResponse {
    fn from(response: BulkResponse) -> Self {
        let items = response
            .items
            .into_iter()
            .map(|item| {
                let raw = RawBulkItem {
                    index: item.index,
                    id: item.id,
                    status: item.status,
                    result: item.result,
                    error: item.error,
                };
                HashMap::from([(item.action, raw)])
            })
            .collect();

        Self {
            took: response.took_ms,
            errors: response.errors,
            items,
        }
    }
}

/// Backend acknowledgement of a single-document write or delete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOutcome {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_version", default)]
    pub version: Option<u64>,
    /// `created`, `updated`, `deleted`, `not_found` or `noop`
    pub result: String,
}
