//! Runtime client seam and the per-endpoint client cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::CommandError;

/// Connection to one container runtime.
///
/// Implementations report failures as [`CommandError::RuntimeCommandFailed`].
#[async_trait]
pub trait RuntimeClient: Send + Sync + 'static {
    /// Stops a container, waiting up to `grace` before the runtime kills it.
    async fn stop(&self, container_id: &str, grace: Duration) -> Result<(), CommandError>;

    async fn pause(&self, container_id: &str) -> Result<(), CommandError>;

    async fn unpause(&self, container_id: &str) -> Result<(), CommandError>;

    /// Sends `signal` (e.g. `SIGKILL`) to the container's main process.
    async fn kill(&self, container_id: &str, signal: &str) -> Result<(), CommandError>;
}

/// Creates runtime clients for resolved endpoints.
#[async_trait]
pub trait RuntimeConnector: Send + Sync + 'static {
    /// Connects to `endpoint` (`unix:///...`).
    ///
    /// `api_version` is set for Docker engine endpoints and `None` for CRI.
    /// Failures are reported as [`CommandError::Connect`].
    async fn connect(
        &self,
        endpoint: &str,
        api_version: Option<&str>,
    ) -> Result<Arc<dyn RuntimeClient>, CommandError>;
}

type ClientKey = (String, Option<String>);

/// Clients keyed by endpoint and API version, created on first use.
///
/// Failed connections are not cached; the next command retries the connect.
pub struct ClientCache {
    connector: Arc<dyn RuntimeConnector>,
    clients: Mutex<HashMap<ClientKey, Arc<dyn RuntimeClient>>>,
}

impl ClientCache {
    pub fn new(connector: Arc<dyn RuntimeConnector>) -> Self {
        Self {
            connector,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached client for `endpoint` at `api_version`, connecting if there is none.
    pub async fn get(
        &self,
        endpoint: &str,
        api_version: Option<&str>,
    ) -> Result<Arc<dyn RuntimeClient>, CommandError> {
        let key = (endpoint.to_string(), api_version.map(str::to_string));
        if let Some(client) = self.lookup(&key) {
            return Ok(client);
        }

        debug!(endpoint, ?api_version, "connecting to container runtime");
        let client = self.connector.connect(endpoint, api_version).await?;

        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        // A concurrent command may have connected first; keep the earliest client.
        let client = clients.entry(key).or_insert(client).clone();
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &ClientKey) -> Option<Arc<dyn RuntimeClient>> {
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Noop;

    #[async_trait]
    impl RuntimeClient for Noop {
        async fn stop(&self, _: &str, _: Duration) -> Result<(), CommandError> {
            Ok(())
        }
        async fn pause(&self, _: &str) -> Result<(), CommandError> {
            Ok(())
        }
        async fn unpause(&self, _: &str) -> Result<(), CommandError> {
            Ok(())
        }
        async fn kill(&self, _: &str, _: &str) -> Result<(), CommandError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Counting {
        connects: AtomicUsize,
        refuse: bool,
    }

    #[async_trait]
    impl RuntimeConnector for Counting {
        async fn connect(
            &self,
            endpoint: &str,
            _api_version: Option<&str>,
        ) -> Result<Arc<dyn RuntimeClient>, CommandError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse {
                return Err(CommandError::Connect {
                    endpoint: endpoint.to_string(),
                    reason: "connection refused".into(),
                });
            }
            Ok(Arc::new(Noop))
        }
    }

    #[tokio::test]
    async fn clients_are_reused_per_endpoint() {
        let connector = Arc::new(Counting::default());
        let cache = ClientCache::new(connector.clone());

        let docker = "unix:///var/run/docker.sock";
        cache.get(docker, Some("v1.18")).await.expect("docker");
        cache.get(docker, Some("v1.18")).await.expect("docker again");
        cache.get(docker, Some("v1.41")).await.expect("docker, other version");
        cache.get("unix:///run/crio/crio.sock", None).await.expect("cri");

        assert_eq!(connector.connects.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn failed_connects_are_not_cached() {
        let connector = Arc::new(Counting {
            refuse: true,
            ..Counting::default()
        });
        let cache = ClientCache::new(connector.clone());

        for _ in 0..2 {
            let err = cache.get("unix:///var/run/docker.sock", Some("v1.18")).await.err();
            assert!(matches!(err, Some(CommandError::Connect { .. })));
        }
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }
}
