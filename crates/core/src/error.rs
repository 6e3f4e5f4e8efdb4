//! Unified error types for offcache.
//!
//! Every message carries a stable code prefix so logs and the proxy's
//! control API can be grepped the same way.

use tokio_rusqlite::rusqlite;

/// Unified error types for the offline cache controller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid URL or a URL that cannot be resolved against the origin.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// The network fetch was rejected (connection refused, DNS, TLS, ...).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// No cache entry found for the given URL.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Write to a store that is not open.
    #[error("CACHE_ERROR: unknown store {0}")]
    UnknownStore(String),

    /// Invalid hash format.
    #[error("CACHE_ERROR: invalid hash format")]
    InvalidHash,

    /// Stored headers could not be encoded or decoded.
    #[error("CACHE_ERROR: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No controller is registered.
    #[error("NOT_REGISTERED")]
    NotRegistered,
}

impl Error {
    /// Whether the error came from the network side of a fetch.
    ///
    /// These are the failures the controller recovers from via its cache
    /// fallbacks.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::FetchTimeout(_) | Error::FetchTooLarge(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
