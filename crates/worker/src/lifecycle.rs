//! Generation lifecycle: install, activate, garbage-collect.
//!
//! A generation is one deployment of the worker, identified by the version
//! tag embedded in its partition names. Install provisions the static
//! partition all-or-nothing; activation deletes every partition belonging
//! to a superseded generation. A failed install leaves the previously
//! active generation authoritative; retry is the caller's responsibility.

use url::Url;

use offcache_core::{Error, StoreDb};

use crate::strategy::StrategyEngine;

/// Names of the currently addressable partitions.
///
/// Usually both carry the same version tag, but the static and dynamic
/// tags may diverge across deployments; activation keeps whatever pair is
/// current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub static_name: String,
    pub dynamic_name: String,
}

impl Generation {
    pub fn new(version: &str) -> Self {
        Self {
            static_name: format!("static-{version}"),
            dynamic_name: format!("dynamic-{version}"),
        }
    }

    /// A generation with explicitly named partitions.
    pub fn from_names(static_name: &str, dynamic_name: &str) -> Self {
        Self { static_name: static_name.to_string(), dynamic_name: dynamic_name.to_string() }
    }

    /// True when the named partition belongs to this generation.
    pub fn owns(&self, partition_name: &str) -> bool {
        partition_name == self.static_name || partition_name == self.dynamic_name
    }
}

/// Lifecycle states of a worker generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Not yet installed.
    New,
    Installing,
    Installed,
    Activating,
    Active,
}

/// Drives a generation through install and activation.
pub struct LifecycleManager {
    store: StoreDb,
    generation: Generation,
    state: LifecycleState,
}

impl LifecycleManager {
    pub fn new(store: StoreDb, generation: Generation) -> Self {
        Self { store, generation, state: LifecycleState::New }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    /// Install this generation by precaching the static manifest.
    ///
    /// All-or-nothing: on failure nothing is written, the state returns to
    /// `New`, and the prior generation keeps serving.
    pub async fn install(&mut self, engine: &StrategyEngine, manifest: &[Url]) -> Result<(), Error> {
        self.state = LifecycleState::Installing;
        tracing::info!(generation = %self.generation.static_name, urls = manifest.len(), "installing");

        match engine.precache(manifest).await {
            Ok(()) => {
                self.state = LifecycleState::Installed;
                tracing::info!(generation = %self.generation.static_name, "installed");
                Ok(())
            }
            Err(err) => {
                self.state = LifecycleState::New;
                tracing::warn!(generation = %self.generation.static_name, error = %err, "install failed; prior generation stays authoritative");
                Err(err)
            }
        }
    }

    /// Activate this generation: delete every partition whose name matches
    /// neither the current static nor current dynamic name, then begin
    /// claiming requests.
    pub async fn activate(&mut self) -> Result<(), Error> {
        self.state = LifecycleState::Activating;
        tracing::info!(generation = %self.generation.static_name, "activating");

        let names = self.store.list_partitions().await?;
        for name in names {
            if !self.generation.owns(&name) {
                tracing::info!(partition = %name, "deleting superseded partition");
                self.store.delete_partition(&name).await?;
            }
        }

        self.state = LifecycleState::Active;
        tracing::info!(generation = %self.generation.static_name, "active");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockTransport, snapshot_with_body};
    use offcache_core::store::compute_cache_key;
    use std::sync::Arc;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_generation_names() {
        let generation = Generation::new("v2");
        assert_eq!(generation.static_name, "static-v2");
        assert_eq!(generation.dynamic_name, "dynamic-v2");
        assert!(generation.owns("static-v2"));
        assert!(generation.owns("dynamic-v2"));
        assert!(!generation.owns("static-v1"));
    }

    #[tokio::test]
    async fn test_install_transitions() {
        let store = StoreDb::open_in_memory().await.unwrap();
        let generation = Generation::new("v1");
        let transport = MockTransport::new();
        transport.respond("https://shop.example/", 200, "text/html", b"<html>root</html>");
        let engine = StrategyEngine::new(store.clone(), Arc::new(transport), generation.clone());
        let mut lifecycle = LifecycleManager::new(store, generation);

        assert_eq!(lifecycle.state(), LifecycleState::New);
        lifecycle.install(&engine, &[url("https://shop.example/")]).await.unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Installed);
    }

    #[tokio::test]
    async fn test_failed_install_never_reaches_installed() {
        let store = StoreDb::open_in_memory().await.unwrap();
        let generation = Generation::new("v2");
        let transport = MockTransport::new();
        transport.respond("https://shop.example/", 200, "text/html", b"<html>root</html>");
        transport.fail("https://shop.example/menu/", "offline");
        let engine = StrategyEngine::new(store.clone(), Arc::new(transport), generation.clone());
        let mut lifecycle = LifecycleManager::new(store.clone(), generation);

        let result = lifecycle
            .install(&engine, &[url("https://shop.example/"), url("https://shop.example/menu/")])
            .await;
        assert!(result.is_err());
        assert_eq!(lifecycle.state(), LifecycleState::New);
        assert!(!store.list_partitions().await.unwrap().contains(&"static-v2".to_string()));
    }

    #[tokio::test]
    async fn test_activation_deletes_exactly_stale_partitions() {
        let store = StoreDb::open_in_memory().await.unwrap();

        let old_static = store.open_partition("static-v1").await.unwrap();
        let root = url("https://shop.example/");
        store
            .put_snapshot(&old_static, &compute_cache_key("GET", &root), &snapshot_with_body("https://shop.example/", b"old"))
            .await
            .unwrap();
        store.open_partition("static-v2").await.unwrap();
        store.open_partition("dynamic-v1").await.unwrap();

        // current pair carries mixed tags; only names matching it survive
        let generation = Generation::from_names("static-v2", "dynamic-v1");
        let mut lifecycle = LifecycleManager::new(store.clone(), generation);
        lifecycle.activate().await.unwrap();

        let names = store.list_partitions().await.unwrap();
        assert_eq!(names, vec!["dynamic-v1", "static-v2"]);
        assert_eq!(lifecycle.state(), LifecycleState::Active);
    }

    #[tokio::test]
    async fn test_activation_keeps_current_pair() {
        let store = StoreDb::open_in_memory().await.unwrap();
        store.open_partition("static-v1").await.unwrap();
        store.open_partition("dynamic-v1").await.unwrap();
        store.open_partition("static-v0").await.unwrap();

        let mut lifecycle = LifecycleManager::new(store.clone(), Generation::new("v1"));
        lifecycle.activate().await.unwrap();

        let names = store.list_partitions().await.unwrap();
        assert_eq!(names, vec!["dynamic-v1", "static-v1"]);
    }
}
