//! The host-facing worker surface.
//!
//! The host invokes `on_install` once per deployed generation,
//! `on_activate` after a successful install, and `intercept` for every
//! outbound request. Control messages arrive through `on_message`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use offcache_client::{HttpTransport, Transport, TransportConfig};
use offcache_core::{AppConfig, Error, RequestDescriptor, ResponseSnapshot, StoreDb};

use crate::classify::{Route, classify};
use crate::fallback::FallbackProvider;
use crate::lifecycle::{Generation, LifecycleManager, LifecycleState};
use crate::strategy::StrategyEngine;

/// Host-delivered control messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Skip the graceful handover and activate immediately.
    ForceActivate,
    /// Write-through fetch-and-store into the dynamic partition, ignoring
    /// the classifier.
    Prefetch { urls: Vec<Url> },
}

/// The request-interception caching worker.
pub struct CacheWorker {
    engine: StrategyEngine,
    lifecycle: LifecycleManager,
    fallback: FallbackProvider,
    transport: Arc<dyn Transport>,
    origin: Url,
}

impl CacheWorker {
    /// Build a worker from configuration, opening the store at the
    /// configured path and using the reqwest transport.
    pub async fn new(config: &AppConfig) -> Result<Self, Error> {
        let store = StoreDb::open(&config.db_path).await?;
        let transport = HttpTransport::new(TransportConfig {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        })?;
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        Ok(Self::from_parts(store, Arc::new(transport), origin, Generation::new(&config.version)))
    }

    /// Build a worker from explicit parts; hosts supply their own
    /// transport here.
    pub fn from_parts(store: StoreDb, transport: Arc<dyn Transport>, origin: Url, generation: Generation) -> Self {
        let engine = StrategyEngine::new(store.clone(), Arc::clone(&transport), generation.clone());
        let fallback = FallbackProvider::new(store.clone(), generation.clone(), origin.clone());
        let lifecycle = LifecycleManager::new(store, generation);
        Self { engine, lifecycle, fallback, transport, origin }
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Handle one intercepted request.
    ///
    /// Classifies the request, runs the assigned strategy, and consults
    /// the fallback provider on total failure. The request itself is never
    /// mutated. Bypass routes go straight to the transport with no store
    /// involvement.
    pub async fn intercept(&self, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error> {
        match classify(request, &self.origin) {
            Route::Bypass => {
                tracing::debug!(url = %request.url, method = %request.method, "bypassing cache");
                let response = self.transport.fetch(request).await?;
                Ok(response.into_snapshot())
            }
            Route::Strategy(tag) => match self.engine.run(tag, request).await {
                Ok(snapshot) => Ok(snapshot),
                Err(err) => match self.fallback.resolve(request).await {
                    Ok(snapshot) => Ok(snapshot),
                    Err(Error::FallbackUnavailable(_)) => Err(err),
                    Err(fallback_err) => Err(fallback_err),
                },
            },
        }
    }

    /// Install this generation: precache the static manifest
    /// all-or-nothing.
    pub async fn on_install(&mut self, manifest: &[Url]) -> Result<(), Error> {
        self.lifecycle.install(&self.engine, manifest).await
    }

    /// Activate this generation, retiring superseded partitions.
    pub async fn on_activate(&mut self) -> Result<(), Error> {
        self.lifecycle.activate().await
    }

    /// Handle a host-delivered control message.
    pub async fn on_message(&mut self, command: Command) -> Result<(), Error> {
        match command {
            Command::ForceActivate => {
                tracing::info!("force-activate requested");
                self.lifecycle.activate().await
            }
            Command::Prefetch { urls } => self.engine.prefetch(&urls).await,
        }
    }

    /// Background sync trigger. An extension point: the tag is recognized
    /// and logged, but no queuing or dispatch is wired in.
    pub async fn on_sync(&self, tag: &str) -> Result<(), Error> {
        tracing::info!(tag, "sync event received; no sync backend configured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockTransport, snapshot_with_body, wait_for_body};
    use offcache_core::store::compute_cache_key;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn worker_with(transport: MockTransport, store: StoreDb) -> CacheWorker {
        CacheWorker::from_parts(
            store,
            Arc::new(transport),
            url("https://shop.example"),
            Generation::new("v1"),
        )
    }

    #[test]
    fn test_command_deserializes_from_host_json() {
        let force: Command = serde_json::from_str(r#"{"type":"FORCE_ACTIVATE"}"#).unwrap();
        assert!(matches!(force, Command::ForceActivate));

        let prefetch: Command =
            serde_json::from_str(r#"{"type":"PREFETCH","urls":["https://shop.example/offers/"]}"#).unwrap();
        match prefetch {
            Command::Prefetch { urls } => assert_eq!(urls.len(), 1),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bypass_skips_store() {
        let transport = MockTransport::new();
        transport.respond("https://shop.example/admin/orders/", 200, "text/html", b"<html>admin</html>");
        let store = StoreDb::open_in_memory().await.unwrap();
        let worker = worker_with(transport, store.clone());

        let request = RequestDescriptor::get(url("https://shop.example/admin/orders/"));
        let snapshot = worker.intercept(&request).await.unwrap();
        assert_eq!(snapshot.body, b"<html>admin</html>");

        // nothing was written
        assert!(store.list_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bypass_propagates_failure_without_fallback() {
        let transport = MockTransport::new();
        transport.fail("https://shop.example/menu/?no-cache=1", "offline");
        let store = StoreDb::open_in_memory().await.unwrap();
        let worker = worker_with(transport, store);

        let request = RequestDescriptor::get(url("https://shop.example/menu/?no-cache=1")).accept("text/html");
        let result = worker.intercept(&request).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_intercept_serves_cached_document_offline() {
        let transport = MockTransport::new();
        transport.fail("https://shop.example/menu/", "offline");
        let store = StoreDb::open_in_memory().await.unwrap();
        let worker = worker_with(transport, store.clone());

        let request = RequestDescriptor::get(url("https://shop.example/menu/")).accept("text/html");
        let key = compute_cache_key("GET", &request.url);
        let dynamic = store.open_partition("dynamic-v1").await.unwrap();
        store
            .put_snapshot(&dynamic, &key, &snapshot_with_body("https://shop.example/menu/", b"<html>menu</html>"))
            .await
            .unwrap();

        let snapshot = worker.intercept(&request).await.unwrap();
        assert_eq!(snapshot.body, b"<html>menu</html>");
    }

    #[tokio::test]
    async fn test_intercept_falls_back_to_offline_page() {
        let transport = MockTransport::new();
        transport.fail("https://shop.example/menu/", "offline");
        let store = StoreDb::open_in_memory().await.unwrap();
        let worker = worker_with(transport, store);

        let request = RequestDescriptor::get(url("https://shop.example/menu/")).accept("text/html");
        let snapshot = worker.intercept(&request).await.unwrap();
        assert_eq!(snapshot.status, 200);
        assert_eq!(snapshot.content_type.as_deref(), Some("text/html"));
    }

    #[tokio::test]
    async fn test_intercept_falls_back_to_placeholder_image() {
        let transport = MockTransport::new();
        transport.fail("https://shop.example/media/latte.png", "offline");
        let store = StoreDb::open_in_memory().await.unwrap();
        let worker = worker_with(transport, store);

        let request = RequestDescriptor::get(url("https://shop.example/media/latte.png"));
        let snapshot = worker.intercept(&request).await.unwrap();
        assert_eq!(snapshot.status, 200);
        assert_eq!(snapshot.content_type.as_deref(), Some("image/svg+xml"));
    }

    #[tokio::test]
    async fn test_intercept_propagates_original_error_without_fallback() {
        let transport = MockTransport::new();
        transport.fail("https://shop.example/api/orders/", "connection refused");
        let store = StoreDb::open_in_memory().await.unwrap();
        let worker = worker_with(transport, store);

        let request = RequestDescriptor::get(url("https://shop.example/api/orders/")).accept("application/json");
        let result = worker.intercept(&request).await;
        match result {
            Err(Error::Network(msg)) => assert!(msg.contains("connection refused")),
            other => panic!("expected the transport failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_install_then_activate_retires_old_generations() {
        let transport = MockTransport::new();
        transport.respond("https://shop.example/", 200, "text/html", b"<html>root</html>");
        let store = StoreDb::open_in_memory().await.unwrap();
        store.open_partition("static-v0").await.unwrap();
        store.open_partition("dynamic-v0").await.unwrap();
        let mut worker = worker_with(transport, store.clone());

        worker.on_install(&[url("https://shop.example/")]).await.unwrap();
        assert_eq!(worker.state(), LifecycleState::Installed);

        worker.on_activate().await.unwrap();
        assert_eq!(worker.state(), LifecycleState::Active);

        let names = store.list_partitions().await.unwrap();
        assert_eq!(names, vec!["static-v1"]);
    }

    #[tokio::test]
    async fn test_force_activate_message() {
        let transport = MockTransport::new();
        let store = StoreDb::open_in_memory().await.unwrap();
        store.open_partition("static-v0").await.unwrap();
        let mut worker = worker_with(transport, store.clone());

        worker.on_message(Command::ForceActivate).await.unwrap();
        assert_eq!(worker.state(), LifecycleState::Active);
        assert!(store.list_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prefetch_message_ignores_classifier() {
        let transport = MockTransport::new();
        // an admin path would classify as bypass, but prefetch stores it anyway
        transport.respond("https://shop.example/admin/reports/", 200, "text/html", b"<html>report</html>");
        let store = StoreDb::open_in_memory().await.unwrap();
        let mut worker = worker_with(transport, store.clone());

        worker
            .on_message(Command::Prefetch { urls: vec![url("https://shop.example/admin/reports/")] })
            .await
            .unwrap();

        let dynamic = store.open_partition("dynamic-v1").await.unwrap();
        let key = compute_cache_key("GET", &url("https://shop.example/admin/reports/"));
        wait_for_body(&store, &dynamic, &key, b"<html>report</html>").await;
    }

    #[tokio::test]
    async fn test_sync_is_a_noop_extension_point() {
        let transport = MockTransport::new();
        let store = StoreDb::open_in_memory().await.unwrap();
        let worker = worker_with(transport, store);

        worker.on_sync("order-sync").await.unwrap();
    }
}
