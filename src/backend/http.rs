use crate::backend::SearchBackend;
use crate::config::EsConfig;
use crate::error::{EsError, Result};
use crate::models::{BulkOperation, BulkResponse, SearchResponse, WriteOutcome};
use crate::search::CompiledQuery;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const REFRESH: (&str, &str) = ("refresh", "wait_for");

/// Search backend reached over HTTP
#[derive(Clone)]
pub struct HttpBackend {
    pub(crate) client: Client,
    endpoint: Url,
    login_name: Option<String>,
    password: Option<String>,
    pub(crate) timeout_secs: u64,
}

impl HttpBackend {
    /// Create a connection.
    ///
    /// No request is sent; reachability is checked by [`SearchBackend::ping`].
    pub fn connect(config: &EsConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| EsError::Connection(e.to_string()))?;

        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            EsError::Connection(format!("invalid endpoint '{}': {}", config.endpoint, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| EsError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        info!(endpoint = %endpoint, "Search backend client created");

        Ok(Self {
            client,
            endpoint,
            login_name: config.login_name.clone(),
            password: config.password.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Endpoint URL with the given path segments appended (percent-encoded)
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                EsError::Connection(format!("endpoint '{}' cannot be a base URL", self.endpoint))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self
            .client
            .request(method, url)
            .header("User-Agent", concat!("es-query-session/", env!("CARGO_PKG_VERSION")));

        match self.login_name {
            Some(ref login_name) => request.basic_auth(login_name, self.password.as_ref()),
            None => request,
        }
    }

    fn describe(&self, e: &reqwest::Error) -> String {
        if e.is_timeout() {
            format!("request timed out after {} seconds", self.timeout_secs)
        } else if e.is_connect() {
            format!("failed to connect to {}: {}", self.endpoint, e)
        } else {
            format!("request failed: {}", e)
        }
    }

    /// Read the body of an unsuccessful response for the error message
    async fn failure_body(response: reqwest::Response) -> String {
        let body = response.text().await.unwrap_or_default();
        if body.is_empty() {
            "No response body".to_string()
        } else {
            body
        }
    }
}

#[async_trait]
impl SearchBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn ping(&self) -> bool {
        let url = match self.url(&[]) {
            Ok(url) => url,
            Err(_) => return false,
        };

        match self.request(Method::HEAD, url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(
                    endpoint = %self.endpoint,
                    status = %response.status(),
                    "Search backend ping failed"
                );
                false
            }
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Search backend unreachable");
                false
            }
        }
    }

    async fn search(&self, index: &str, query: &CompiledQuery) -> Result<SearchResponse> {
        let url = self
            .url(&[index, "_search"])
            .map_err(|e| EsError::Search(e.to_string()))?;
        let body = query.to_body();
        debug!(index = %index, body = %body, "Executing search");

        let response = self
            .request(Method::POST, url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EsError::Search(self.describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = Self::failure_body(response).await;
            error!(index = %index, status = %status, "Search returned non-success status");
            return Err(EsError::Search(format!(
                "backend returned non-success status {}: {}",
                status, body
            )));
        }

        response
            .json::<SearchResponse>()
            .await
            .map_err(|e| EsError::Search(format!("invalid search response: {}", e)))
    }

    async fn delete(&self, index: &str, id: &str) -> Result<WriteOutcome> {
        let url = self
            .url(&[index, "_doc", id])
            .map_err(|e| EsError::DeletionFailed(e.to_string()))?;

        let response = self
            .request(Method::DELETE, url)
            .query(&[REFRESH])
            .send()
            .await
            .map_err(|e| EsError::DeletionFailed(self.describe(&e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            // Missing document answers {"result":"not_found"}; a missing index has no result
            let body = response.text().await.unwrap_or_default();
            return match serde_json::from_str::<WriteOutcome>(&body) {
                Ok(outcome) => Ok(outcome),
                Err(_) => Err(EsError::NotFound {
                    index: index.to_string(),
                    id: id.to_string(),
                }),
            };
        }
        if !status.is_success() {
            let body = Self::failure_body(response).await;
            return Err(EsError::DeletionFailed(format!(
                "backend returned non-success status {}: {}",
                status, body
            )));
        }

        response
            .json::<WriteOutcome>()
            .await
            .map_err(|e| EsError::DeletionFailed(format!("invalid delete response: {}", e)))
    }

    async fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse> {
        let url = self.url(&["_bulk"]).map_err(|e| EsError::Write(e.to_string()))?;

        let mut payload = String::new();
        for operation in operations {
            operation.write_ndjson(&mut payload)?;
        }

        let response = self
            .request(Method::POST, url)
            .query(&[REFRESH])
            .header("Content-Type", "application/x-ndjson")
            .body(payload)
            .send()
            .await
            .map_err(|e| EsError::Write(self.describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = Self::failure_body(response).await;
            return Err(EsError::Write(format!(
                "bulk returned non-success status {}: {}",
                status, body
            )));
        }

        response
            .json::<BulkResponse>()
            .await
            .map_err(|e| EsError::Write(format!("invalid bulk response: {}", e)))
    }

    async fn upsert(&self, index: &str, id: &str, document: &Value) -> Result<WriteOutcome> {
        let url = self
            .url(&[index, "_doc", id])
            .map_err(|e| EsError::Write(e.to_string()))?;

        let response = self
            .request(Method::PUT, url)
            .query(&[REFRESH])
            .json(document)
            .send()
            .await
            .map_err(|e| EsError::Write(self.describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = Self::failure_body(response).await;
            return Err(EsError::Write(format!(
                "index returned non-success status {}: {}",
                status, body
            )));
        }

        response
            .json::<WriteOutcome>()
            .await
            .map_err(|e| EsError::Write(format!("invalid index response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_does_not_send_requests() {
        let config = EsConfig::builder()
            .endpoint("http://127.0.0.1:1")
            .build()
            .unwrap();
        let backend = HttpBackend::connect(&config).unwrap();
        assert_eq!(backend.timeout_secs, 30);
    }

    #[test]
    fn test_connect_rejects_bad_endpoint() {
        let config = EsConfig {
            endpoint: "not a url".to_string(),
            ..Default::default()
        };
        let err = HttpBackend::connect(&config).err().unwrap();
        assert_eq!(err.error_code(), "CONNECTION_ERROR");
    }

    #[test]
    fn test_url_segments_are_encoded() {
        let config = EsConfig::builder()
            .endpoint("http://localhost:9200/")
            .build()
            .unwrap();
        let backend = HttpBackend::connect(&config).unwrap();

        let url = backend.url(&["products", "_doc", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9200/products/_doc/a%2Fb%20c");

        let root = backend.url(&[]).unwrap();
        assert_eq!(root.as_str(), "http://localhost:9200/");
    }
}
