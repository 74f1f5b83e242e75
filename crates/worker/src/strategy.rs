//! The strategy engine.
//!
//! Four algorithms orchestrating network fetch and store read/write, each
//! with a specific consistency/latency tradeoff. All writes go to the
//! current dynamic partition; the static partition is written once, at
//! install, by `precache`. Shared invariant: a response is persisted only
//! when its status indicates success.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

use offcache_client::Transport;
use offcache_core::store::compute_cache_key;
use offcache_core::{Error, RequestDescriptor, ResponseSnapshot, StoreDb};

use crate::classify::StrategyTag;
use crate::lifecycle::Generation;

/// Concurrent fetches during precache/prefetch batches.
const BATCH_CONCURRENCY: usize = 4;

/// Executes the per-request caching strategies against one generation's
/// partitions.
///
/// Cheap to clone; background refresh tasks run on a cloned engine.
#[derive(Clone)]
pub struct StrategyEngine {
    store: StoreDb,
    transport: Arc<dyn Transport>,
    generation: Generation,
}

impl StrategyEngine {
    pub fn new(store: StoreDb, transport: Arc<dyn Transport>, generation: Generation) -> Self {
        Self { store, transport, generation }
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    /// Run the strategy assigned by the classifier.
    pub async fn run(&self, tag: StrategyTag, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error> {
        match tag {
            StrategyTag::NetworkFirst => self.network_first(request).await,
            StrategyTag::CacheFirst => self.cache_first(request).await,
            StrategyTag::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
        }
    }

    /// Prefer the network; fall back to the store when the transport fails.
    ///
    /// Only a transport failure consults the store. Any other error means
    /// a fresh response was unobtainable for a non-network reason, and a
    /// stale snapshot would mask it.
    async fn network_first(&self, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error> {
        match self.fetch_and_store(request).await {
            Ok(snapshot) => Ok(snapshot),
            Err(err @ Error::Network(_)) => {
                let key = compute_cache_key(&request.method, &request.url);
                match self.lookup(&key).await? {
                    Some(snapshot) => {
                        tracing::debug!(url = %request.url, "network failed; serving stored snapshot");
                        Ok(snapshot)
                    }
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Prefer the store; a hit returns immediately and triggers a detached
    /// best-effort refresh whose failure never reaches the caller.
    async fn cache_first(&self, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error> {
        let key = compute_cache_key(&request.method, &request.url);
        if let Some(snapshot) = self.lookup(&key).await? {
            tracing::debug!(url = %request.url, "cache hit; refreshing in background");
            self.spawn_refresh(request.clone());
            return Ok(snapshot);
        }

        self.fetch_and_store(request).await
    }

    /// Return the stored snapshot immediately if there is one, then
    /// revalidate it in the background. Without a stored snapshot, wait
    /// for the network.
    ///
    /// The lookup completes before the revalidation fetch starts, so the
    /// caller always receives the snapshot that was current at interception
    /// time, never the one the revalidation is about to write.
    async fn stale_while_revalidate(&self, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error> {
        let key = compute_cache_key(&request.method, &request.url);
        if let Some(snapshot) = self.lookup(&key).await? {
            tracing::debug!(url = %request.url, "serving stale snapshot while revalidating");
            self.spawn_refresh(request.clone());
            return Ok(snapshot);
        }

        self.fetch_and_store(request).await
    }

    /// Fetch every manifest URL and write the batch to the static
    /// partition. All-or-nothing: any failed fetch (or non-success status)
    /// fails the install and nothing is written.
    pub async fn precache(&self, manifest: &[Url]) -> Result<(), Error> {
        if manifest.is_empty() {
            return Err(Error::InvalidInput("precache manifest cannot be empty".into()));
        }

        let semaphore = Arc::new(Semaphore::new(BATCH_CONCURRENCY));
        let mut join_set = JoinSet::new();

        for url in manifest.iter().cloned() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::InstallFailed(e.to_string()))?;
            let transport = Arc::clone(&self.transport);

            join_set.spawn(async move {
                let _permit = permit;
                let request = RequestDescriptor::get(url.clone());
                let response = transport.fetch(&request).await?;
                if !response.is_success() {
                    return Err(Error::InstallFailed(format!("{} returned status {}", url, response.status)));
                }
                let key = compute_cache_key("GET", &url);
                Ok::<_, Error>((key, response.into_snapshot()))
            });
        }

        let mut entries = Vec::with_capacity(manifest.len());
        while let Some(joined) = join_set.join_next().await {
            let fetched = joined.map_err(|e| Error::InstallFailed(e.to_string()))?;
            match fetched {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    join_set.abort_all();
                    return Err(match err {
                        Error::InstallFailed(_) => err,
                        other => Error::InstallFailed(other.to_string()),
                    });
                }
            }
        }

        self.store.put_batch(&self.generation.static_name, entries).await?;

        tracing::info!(partition = %self.generation.static_name, count = manifest.len(), "precached static manifest");
        Ok(())
    }

    /// Write-through fetch of a URL list into the dynamic partition,
    /// ignoring the classifier. Replaying leaves one entry per key,
    /// holding the latest snapshot.
    pub async fn prefetch(&self, urls: &[Url]) -> Result<(), Error> {
        for url in urls {
            let request = RequestDescriptor::get(url.clone());
            let snapshot = self.fetch_and_store(&request).await?;
            if !snapshot.is_success() {
                tracing::warn!(url = %url, status = snapshot.status, "prefetch got non-success status; not cached");
            }
        }
        Ok(())
    }

    /// Look up a key in the current partitions, dynamic first. Reads never
    /// materialize a partition.
    async fn lookup(&self, key: &str) -> Result<Option<ResponseSnapshot>, Error> {
        if let Some(dynamic) = self.store.find_partition(&self.generation.dynamic_name).await?
            && let Some(snapshot) = self.store.get_snapshot(&dynamic, key).await?
        {
            return Ok(Some(snapshot));
        }

        match self.store.find_partition(&self.generation.static_name).await? {
            Some(stat) => self.store.get_snapshot(&stat, key).await,
            None => Ok(None),
        }
    }

    /// Fetch over the transport, persisting the snapshot to the dynamic
    /// partition when the status indicates success. The response comes
    /// back to the caller either way.
    async fn fetch_and_store(&self, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error> {
        let response = self.transport.fetch(request).await?;
        let snapshot = response.into_snapshot();

        if snapshot.is_success() {
            let key = compute_cache_key(&request.method, &request.url);
            let dynamic = self.store.open_partition(&self.generation.dynamic_name).await?;
            self.store.put_snapshot(&dynamic, &key, &snapshot).await?;
        }

        Ok(snapshot)
    }

    /// Detached best-effort refresh; failures are logged and discarded.
    fn spawn_refresh(&self, request: RequestDescriptor) {
        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(err) = engine.fetch_and_store(&request).await {
                tracing::debug!(url = %request.url, error = %err, "background refresh failed");
            }
        });
    }
}
