//! Cache key derivation.
//!
//! A key is the sha256 of method + URL. The query string participates in
//! the key, except the `no-cache` marker parameter: it signals bypass to
//! the classifier and must not split cache identity.

use sha2::{Digest, Sha256};
use url::Url;

/// Query parameter that marks a request as uncacheable.
pub const BYPASS_MARKER: &str = "no-cache";

/// Compute the cache key for a request.
///
/// Two requests with identical keys are treated as the same resource.
pub fn compute_cache_key(method: &str, url: &Url) -> String {
    let canonical = canonicalize(url);
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

/// Strip the bypass marker parameter; leave everything else untouched.
fn canonicalize(url: &Url) -> Url {
    if !url.query_pairs().any(|(k, _)| k == BYPASS_MARKER) {
        return url.clone();
    }

    let mut canonical = url.clone();
    let remaining: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != BYPASS_MARKER)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if remaining.is_empty() {
        canonical.set_query(None);
    } else {
        canonical
            .query_pairs_mut()
            .clear()
            .extend_pairs(remaining.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    canonical
}
