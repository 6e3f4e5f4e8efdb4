//! Structured errors for the offcache proxy.
//!
//! Every error leaves the proxy as a JSON envelope with a status code
//! derived from the underlying failure.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use offcache_core::Error;

use crate::control::ApiResponse;

/// Structured errors for the offcache proxy.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The incoming request could not be turned into a fetch.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The request settled with no fallback, or the cache failed.
    #[error(transparent)]
    Core(#[from] Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ProxyError::Core(err) => match err {
                Error::InvalidUrl(_) => StatusCode::BAD_REQUEST,
                Error::FetchTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                Error::Network(_) | Error::FetchTooLarge(_) => StatusCode::BAD_GATEWAY,
                Error::CacheMiss(_) => StatusCode::NOT_FOUND,
                Error::NotRegistered => StatusCode::CONFLICT,
                Error::Database(_)
                | Error::MigrationFailed(_)
                | Error::UnknownStore(_)
                | Error::InvalidHash
                | Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        }
        let body: ApiResponse<()> = ApiResponse::failure(self.to_string());
        (status, Json(body)).into_response()
    }
}
