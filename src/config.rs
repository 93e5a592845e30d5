//! Connection configuration

use crate::error::{EsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key holding the backend endpoint
pub const ENDPOINT_KEY: &str = "elasticsearch";

/// Key holding the basic-auth login name
pub const LOGIN_NAME_KEY: &str = "elasticsearch.LoginName";

/// Key holding the basic-auth password
pub const PASSWORD_KEY: &str = "elasticsearch.Password";

/// Key holding the per-request timeout in seconds
pub const TIMEOUT_KEY: &str = "elasticsearch.TimeoutSecs";

/// Read-only key lookup used at session construction
pub trait ConfigSource {
    /// Look up a string value by key
    fn get_string(&self, key: &str) -> Option<String>;
}

impl ConfigSource for HashMap<String, String> {
    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl ConfigSource for config::Config {
    fn get_string(&self, key: &str) -> Option<String> {
        // Environment sources lowercase their keys
        config::Config::get_string(self, key)
            .or_else(|_| config::Config::get_string(self, &key.to_lowercase()))
            .ok()
    }
}

/// Search backend connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsConfig {
    /// Backend endpoint, e.g. `http://localhost:9200`
    pub endpoint: String,

    /// Basic-auth login name
    #[serde(default)]
    pub login_name: Option<String>,

    /// Basic-auth password
    #[serde(default)]
    pub password: Option<String>,

    /// HTTP request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for EsConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9200".to_string(),
            login_name: None,
            password: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl EsConfig {
    /// Create a builder
    pub fn builder() -> EsConfigBuilder {
        EsConfigBuilder::new()
    }

    /// Resolve the configuration from a key lookup.
    ///
    /// The endpoint is read from `elasticsearch`; when that key names a table
    /// (TOML `[elasticsearch]` section) the `elasticsearch.url` entry is used.
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        let endpoint = source
            .get_string(ENDPOINT_KEY)
            .or_else(|| source.get_string("elasticsearch.url"))
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                EsError::Configuration(format!("missing '{}' endpoint", ENDPOINT_KEY))
            })?;

        let request_timeout_secs = match source.get_string(TIMEOUT_KEY) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                EsError::Configuration(format!("invalid '{}' value '{}': {}", TIMEOUT_KEY, raw, e))
            })?,
            None => default_request_timeout(),
        };

        let config = Self {
            endpoint,
            login_name: source.get_string(LOGIN_NAME_KEY).filter(|s| !s.is_empty()),
            password: source.get_string(PASSWORD_KEY),
            request_timeout_secs,
        };
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ES_CONFIG_PATH")
            .unwrap_or_else(|_| "config/elasticsearch.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load configuration from the given file (optional) and environment
    pub fn load_from(config_path: &str) -> Result<Self> {
        let source = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            // Override with environment variables (prefix: ES__)
            .add_source(config::Environment::with_prefix("ES").separator("__"))
            .build()?;

        Self::from_source(&source)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(EsError::Configuration(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(EsError::Configuration(
                "request timeout must be greater than 0".to_string(),
            ));
        }

        if self.password.is_some() && self.login_name.is_none() {
            return Err(EsError::Configuration(
                "password configured without a login name".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for EsConfig
pub struct EsConfigBuilder {
    config: EsConfig,
}

impl EsConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EsConfig::default(),
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn credentials(
        mut self,
        login_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.config.login_name = Some(login_name.into());
        self.config.password = Some(password.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<EsConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for EsConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_source_reads_connection_keys() {
        let src = source(&[
            ("elasticsearch", "http://es.internal:9200"),
            ("elasticsearch.LoginName", "elastic"),
            ("elasticsearch.Password", "secret"),
        ]);

        let config = EsConfig::from_source(&src).unwrap();
        assert_eq!(config.endpoint, "http://es.internal:9200");
        assert_eq!(config.login_name.as_deref(), Some("elastic"));
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_from_source_missing_endpoint() {
        let err = EsConfig::from_source(&source(&[])).unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_from_source_invalid_timeout() {
        let src = source(&[
            ("elasticsearch", "http://localhost:9200"),
            ("elasticsearch.TimeoutSecs", "soon"),
        ]);
        assert!(EsConfig::from_source(&src).is_err());
    }

    #[test]
    fn test_builder_validation() {
        assert!(EsConfig::builder().endpoint("localhost:9200").build().is_err());
        assert!(EsConfig::builder().request_timeout_secs(0).build().is_err());

        let config = EsConfig::builder()
            .endpoint("https://search.example.com")
            .credentials("elastic", "changeme")
            .request_timeout_secs(5)
            .build()
            .unwrap();
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.login_name.as_deref(), Some("elastic"));
    }
}
