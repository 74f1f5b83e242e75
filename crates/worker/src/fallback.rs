//! Synthesized responses for total failure.
//!
//! When both the network and the store come up empty, the fallback
//! provider answers by the request's expected content type, not its URL:
//! documents get the precached root page or a built-in offline page,
//! images get a placeholder. Everything else has no fallback and the
//! original failure propagates.

use url::Url;

use offcache_core::request::{Destination, RequestDescriptor};
use offcache_core::store::compute_cache_key;
use offcache_core::{Error, ResponseSnapshot, StoreDb};

use crate::classify;
use crate::lifecycle::Generation;

const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Offline</title>
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <style>
    body { font-family: sans-serif; text-align: center; padding: 4rem 1rem; }
    h1 { margin-bottom: 0.5rem; }
  </style>
</head>
<body>
  <h1>You&rsquo;re offline</h1>
  <p>This page isn&rsquo;t available without a connection. Check your network and try again.</p>
</body>
</html>
"#;

const PLACEHOLDER_IMAGE: &str = r##"<svg width="300" height="200" xmlns="http://www.w3.org/2000/svg">
  <rect width="100%" height="100%" fill="#f8f9fa"/>
  <text x="50%" y="50%" text-anchor="middle" dy=".3em" font-family="sans-serif" font-size="16" fill="#6c757d">Image unavailable offline</text>
</svg>
"##;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg"];

/// Supplies synthesized snapshots when all other resolution paths fail.
#[derive(Clone)]
pub struct FallbackProvider {
    store: StoreDb,
    generation: Generation,
    origin: Url,
}

impl FallbackProvider {
    pub fn new(store: StoreDb, generation: Generation, origin: Url) -> Self {
        Self { store, generation, origin }
    }

    /// Produce a fallback snapshot for a failed request.
    ///
    /// # Errors
    ///
    /// Returns `Error::FallbackUnavailable` when the request is neither a
    /// document nor an image; the caller re-raises the original failure.
    pub async fn resolve(&self, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error> {
        if request.wants_document() || request.destination == Some(Destination::Document) {
            return self.offline_page().await;
        }

        if request.destination == Some(Destination::Image) || classify::has_extension(&request.url, IMAGE_EXTENSIONS) {
            tracing::debug!(url = %request.url, "serving placeholder image");
            return Ok(synthesize(self.origin.as_str(), "image/svg+xml", PLACEHOLDER_IMAGE));
        }

        Err(Error::FallbackUnavailable(format!("no fallback for {}", request.url)))
    }

    /// The precached root page if the static partition holds one, else the
    /// built-in offline document.
    async fn offline_page(&self) -> Result<ResponseSnapshot, Error> {
        let mut root = self.origin.clone();
        root.set_path("/");
        let key = compute_cache_key("GET", &root);

        if let Some(stat) = self.store.find_partition(&self.generation.static_name).await?
            && let Some(snapshot) = self.store.get_snapshot(&stat, &key).await?
        {
            tracing::debug!("serving precached root as offline page");
            return Ok(snapshot);
        }

        tracing::debug!("serving built-in offline page");
        Ok(synthesize(root.as_str(), "text/html", OFFLINE_PAGE))
    }
}

fn synthesize(url: &str, content_type: &str, body: &str) -> ResponseSnapshot {
    ResponseSnapshot::new(
        url,
        200,
        Some(content_type.to_string()),
        vec![("content-type".to_string(), content_type.to_string())],
        body.as_bytes().to_vec(),
    )
}
