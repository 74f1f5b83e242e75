//! Request classification.
//!
//! A pure function mapping an intercepted request to one strategy tag, or
//! to a bypass signal meaning the request goes straight to the network
//! with no caching at all. Rules are evaluated in order; first match wins.
//! The ordering is policy: correctness-sensitive API calls prefer
//! freshness, immutable-looking assets prefer speed, navigable documents
//! balance both.

use offcache_core::request::{Destination, RequestDescriptor};
use offcache_core::store::key::BYPASS_MARKER;
use url::Url;

/// Per-request strategy assignment. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyTag {
    NetworkFirst,
    CacheFirst,
    StaleWhileRevalidate,
}

/// Outcome of classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Straight to network, no store involvement.
    Bypass,
    /// Handled by the named strategy.
    Strategy(StrategyTag),
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg"];
const ASSET_EXTENSIONS: &[&str] = &["css", "js", "woff", "woff2", "ttf", "eot"];

/// Classify a request against the serving origin.
pub fn classify(request: &RequestDescriptor, serving_origin: &Url) -> Route {
    if !request.is_get() {
        return Route::Bypass;
    }

    if has_bypass_marker(&request.url) || is_admin_path(&request.url) {
        return Route::Bypass;
    }

    if request.url.path().starts_with("/api/") {
        return Route::Strategy(StrategyTag::NetworkFirst);
    }

    if request.destination == Some(Destination::Image) || has_extension(&request.url, IMAGE_EXTENSIONS) {
        return Route::Strategy(StrategyTag::CacheFirst);
    }

    if has_extension(&request.url, ASSET_EXTENSIONS) {
        return Route::Strategy(StrategyTag::CacheFirst);
    }

    if request.url.origin() != serving_origin.origin() {
        return Route::Strategy(StrategyTag::CacheFirst);
    }

    if request.wants_document() {
        return Route::Strategy(StrategyTag::StaleWhileRevalidate);
    }

    Route::Strategy(StrategyTag::NetworkFirst)
}

fn has_bypass_marker(url: &Url) -> bool {
    url.query_pairs().any(|(k, _)| k == BYPASS_MARKER)
}

fn is_admin_path(url: &Url) -> bool {
    url.path().contains("/admin/")
}

/// Case-insensitive match of the path's file extension.
pub(crate) fn has_extension(url: &Url, extensions: &[&str]) -> bool {
    let path = url.path();
    let Some((_, ext)) = path.rsplit_once('.') else {
        return false;
    };
    if ext.contains('/') {
        // dot belongs to an earlier path segment
        return false;
    }
    extensions.iter().any(|e| ext.eq_ignore_ascii_case(e))
}
