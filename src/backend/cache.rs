//! Process-wide cached backend connection

use crate::backend::{HttpBackend, SearchBackend};
use crate::config::EsConfig;
use crate::error::Result;
use once_cell::sync::Lazy;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct CachedConnection {
    /// Connection identity: endpoint, credentials and timeout
    config: EsConfig,
    backend: Arc<dyn SearchBackend>,
}

/// Lazily created connection, reused while it answers pings.
///
/// The lock is held across the health check and reconnect so concurrent
/// callers never create duplicate connections.
pub struct ConnectionCache {
    slot: Mutex<Option<CachedConnection>>,
}

impl ConnectionCache {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Get the cached HTTP connection for `config`, connecting when absent,
    /// unhealthy, or created from different connection settings
    pub async fn get_or_connect(&self, config: &EsConfig) -> Result<Arc<dyn SearchBackend>> {
        self.get_or_connect_with(config, || async {
            HttpBackend::connect(config).map(|backend| Arc::new(backend) as Arc<dyn SearchBackend>)
        })
        .await
    }

    /// Same as [`get_or_connect`](Self::get_or_connect) with a custom connector
    pub async fn get_or_connect_with<F, Fut>(
        &self,
        config: &EsConfig,
        connect: F,
    ) -> Result<Arc<dyn SearchBackend>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn SearchBackend>>>,
    {
        let mut slot = self.slot.lock().await;
        let endpoint = &config.endpoint;

        if let Some(ref cached) = *slot {
            if cached.config == *config {
                if cached.backend.ping().await {
                    debug!(endpoint = %endpoint, "Reusing cached search backend connection");
                    return Ok(cached.backend.clone());
                }
                warn!(
                    endpoint = %endpoint,
                    "Cached search backend failed health check, reconnecting"
                );
            } else {
                info!(
                    old = %cached.config.endpoint,
                    new = %endpoint,
                    "Search backend connection settings changed, reconnecting"
                );
            }
        }
        *slot = None;

        let backend = connect().await?;
        info!(
            endpoint = %endpoint,
            backend = backend.name(),
            "Search backend connection created"
        );

        *slot = Some(CachedConnection {
            config: config.clone(),
            backend: backend.clone(),
        });
        Ok(backend)
    }

    /// Drop the cached connection
    pub async fn invalidate(&self) {
        if self.slot.lock().await.take().is_some() {
            info!("Cached search backend connection invalidated");
        }
    }

    pub async fn is_cached(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

impl Default for ConnectionCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Global connection cache instance
pub static GLOBAL_CONNECTION_CACHE: Lazy<ConnectionCache> = Lazy::new(ConnectionCache::new);

/// Helper function to get the shared connection from the global cache
pub async fn shared_backend(config: &EsConfig) -> Result<Arc<dyn SearchBackend>> {
    GLOBAL_CONNECTION_CACHE.get_or_connect(config).await
}
