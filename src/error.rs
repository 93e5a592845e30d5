use thiserror::Error;

/// Prefix carried by every error that originates from the search backend
pub const ERROR_PREFIX: &str = "<elasticsearch error>";

/// Errors produced by query sessions and backends
#[derive(Error, Debug)]
pub enum EsError {
    /// Backend connection could not be established or reused
    #[error("<elasticsearch error> connection failed: {0}")]
    Connection(String),

    /// Search request failed or exceeded its deadline
    #[error("<elasticsearch error> search failed: {0}")]
    Search(String),

    /// Document to delete does not exist
    #[error("<elasticsearch error> document {id} not found in index {index}")]
    NotFound { index: String, id: String },

    /// Backend answered a delete with something other than "deleted"
    #[error("<elasticsearch error> deletion failed: {0}")]
    DeletionFailed(String),

    /// Bulk request without operations
    #[error("no bulk operations supplied")]
    EmptyBulk,

    /// Upsert or bulk write failed
    #[error("<elasticsearch error> write failed: {0}")]
    Write(String),

    /// Document (de)serialization errors
    #[error("<elasticsearch error> serialization failed: {0}")]
    Serialization(String),

    /// Geo point string is not "lat,lon"
    #[error("invalid geo point '{0}': expected \"lat,lon\"")]
    InvalidGeoPoint(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl EsError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            EsError::Connection(_) => "CONNECTION_ERROR",
            EsError::Search(_) => "SEARCH_ERROR",
            EsError::NotFound { .. } => "NOT_FOUND",
            EsError::DeletionFailed(_) => "DELETION_FAILED",
            EsError::EmptyBulk => "EMPTY_BULK",
            EsError::Write(_) => "WRITE_ERROR",
            EsError::Serialization(_) => "SERIALIZATION_ERROR",
            EsError::InvalidGeoPoint(_) => "INVALID_GEO_POINT",
            EsError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    /// Whether the error came from the search backend (and carries the prefix)
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            EsError::Connection(_)
                | EsError::Search(_)
                | EsError::NotFound { .. }
                | EsError::DeletionFailed(_)
                | EsError::Write(_)
                | EsError::Serialization(_)
        )
    }

    /// Metric label for the error
    pub(crate) fn label(&self) -> &'static str {
        match self {
            EsError::Connection(_) => "connection",
            EsError::Search(_) => "search",
            EsError::NotFound { .. } => "not_found",
            EsError::DeletionFailed(_) => "deletion_failed",
            EsError::EmptyBulk => "empty_bulk",
            EsError::Write(_) => "write",
            EsError::Serialization(_) => "serialization",
            EsError::InvalidGeoPoint(_) => "invalid_geo_point",
            EsError::Configuration(_) => "configuration",
        }
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for EsError {
    fn from(err: serde_json::Error) -> Self {
        EsError::Serialization(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for EsError {
    fn from(err: config::ConfigError) -> Self {
        EsError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_carry_prefix() {
        let errors = vec![
            EsError::Connection("refused".to_string()),
            EsError::Search("timeout".to_string()),
            EsError::NotFound {
                index: "products".to_string(),
                id: "1".to_string(),
            },
            EsError::DeletionFailed("noop".to_string()),
            EsError::Write("status 500".to_string()),
        ];

        for err in errors {
            assert!(err.is_backend_error());
            assert!(err.to_string().starts_with(ERROR_PREFIX), "{}", err);
        }
    }

    #[test]
    fn test_local_errors_have_no_prefix() {
        assert!(!EsError::EmptyBulk.is_backend_error());
        assert_eq!(EsError::EmptyBulk.to_string(), "no bulk operations supplied");
        assert!(!EsError::InvalidGeoPoint("x".to_string())
            .to_string()
            .starts_with(ERROR_PREFIX));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(EsError::EmptyBulk.error_code(), "EMPTY_BULK");
        assert_eq!(
            EsError::NotFound {
                index: "i".to_string(),
                id: "1".to_string()
            }
            .error_code(),
            "NOT_FOUND"
        );
        assert_eq!(EsError::Search("x".to_string()).error_code(), "SEARCH_ERROR");
    }

    #[test]
    fn test_from_serde_json() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: EsError = err.into();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }
}
