//! Unified error types for offcache.
//!
//! Store misses are deliberately not part of this taxonomy: a missing key
//! is `Ok(None)` and signals the next strategy step, never a failure.

use tokio_rusqlite::rusqlite;

/// Unified error types for the offcache workspace.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport could not complete the request.
    /// Recoverable by consulting the store.
    #[error("NETWORK_FAILURE: {0}")]
    Network(String),

    /// Store operation failed.
    #[error("STORE_ERROR: {0}")]
    Store(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// One or more precache manifest fetches failed; the new generation
    /// must not activate.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),

    /// No synthesized response exists for the request's content type.
    #[error("FALLBACK_UNAVAILABLE: {0}")]
    FallbackUnavailable(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Invalid input parameters (e.g., empty manifest).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Store(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Store(tokio_rusqlite::Error::Close(c)),
            _ => Error::Store(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Store(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Store(tokio_rusqlite::Error::Error(err))
    }
}
