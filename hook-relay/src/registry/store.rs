//! In-memory endpoint registry.
//!
//! The registry is the single shared mutable resource of the service. It is
//! cheap to clone and every clone points at the same store.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::types::{CapturedRequest, Endpoint};
use crate::util::generate_webhook_id;

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("webhook not found: {0}")]
    NotFound(String),
}

type IdSource = Box<dyn Fn() -> String + Send + Sync>;

/// Concurrency-safe store of endpoints and their captured requests.
///
/// Locks are held only for the map mutation or lookup itself, never across
/// I/O.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    endpoints: RwLock<HashMap<String, Endpoint>>,
    id_source: IdSource,
}

impl Registry {
    /// Create an empty registry using CSPRNG-backed ids.
    pub fn new() -> Self {
        Self::with_id_source(generate_webhook_id)
    }

    /// Create an empty registry drawing ids from `id_source`.
    pub fn with_id_source<F>(id_source: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(RegistryInner {
                endpoints: RwLock::new(HashMap::new()),
                id_source: Box::new(id_source),
            }),
        }
    }

    /// Provision a new endpoint reachable under `base_url`.
    ///
    /// Ids are drawn until one is free; the check and the insert happen under
    /// the same write lock.
    pub async fn create(&self, base_url: &str) -> Endpoint {
        let mut endpoints = self.inner.endpoints.write().await;

        let mut collisions = 0u32;
        let id = loop {
            let candidate = (self.inner.id_source)();
            if !endpoints.contains_key(&candidate) {
                break candidate;
            }
            collisions += 1;
        };

        let endpoint = Endpoint::new(id.clone(), base_url);
        endpoints.insert(id, endpoint.clone());
        let active = endpoints.len();
        drop(endpoints);

        if collisions > 0 {
            debug!(collisions = collisions, "webhook_id_collision");
        }

        info!(
            webhook_id = %endpoint.id,
            webhook_url = %endpoint.url,
            active_webhooks = active,
            "webhook_created"
        );

        endpoint
    }

    /// Snapshot of an endpoint and its full history.
    pub async fn get(&self, id: &str) -> Result<Endpoint, RegistryError> {
        self.inner
            .endpoints
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Append one captured request to an endpoint's history.
    ///
    /// Returns the new history length. Nothing is mutated when the id is
    /// unknown.
    pub async fn append(
        &self,
        id: &str,
        request: CapturedRequest,
    ) -> Result<usize, RegistryError> {
        let mut endpoints = self.inner.endpoints.write().await;
        let endpoint = endpoints
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        endpoint.requests.push(request);
        Ok(endpoint.requests.len())
    }

    /// Whether an endpoint with this id exists.
    pub async fn contains(&self, id: &str) -> bool {
        self.inner.endpoints.read().await.contains_key(id)
    }

    /// Number of live endpoints.
    pub async fn count(&self) -> usize {
        self.inner.endpoints.read().await.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
