//! Control API under `/_offcache`.
//!
//! The bootstrap side of the controller: inspect the active version,
//! register the configured version again, or force-unregister and purge
//! every cache store.

use axum::{Json, extract::State};
use offcache_client::{Fetcher, RegisterReport};
use offcache_core::cache::StoreInfo;
use serde::Serialize;

use crate::error::ProxyError;
use crate::proxy::AppState;

/// Response envelope shared by every control endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn failure(error: String) -> Self {
        Self { success: false, data: None, error: Some(error) }
    }
}

#[derive(Debug, Serialize)]
pub struct ActiveController {
    pub store: String,
    pub version: String,
    pub origin: String,
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub active: Option<ActiveController>,
    pub stores: Vec<StoreInfo>,
}

#[derive(Debug, Serialize)]
pub struct UnregisterBody {
    pub deleted: u64,
}

/// GET /_offcache/status
pub async fn status<F: Fetcher>(State(state): State<AppState<F>>) -> Result<Json<ApiResponse<StatusBody>>, ProxyError> {
    let active = state.registration.active().await.map(|controller| ActiveController {
        store: controller.cache_name().to_string(),
        version: controller.settings().version.clone(),
        origin: controller.settings().origin.to_string(),
    });
    let stores = state.registration.db().list_stores().await?;

    Ok(Json(ApiResponse::ok(StatusBody { active, stores })))
}

/// POST /_offcache/register
pub async fn register<F: Fetcher>(
    State(state): State<AppState<F>>,
) -> Result<Json<ApiResponse<RegisterReport>>, ProxyError> {
    let report = state.registration.register((*state.settings).clone()).await?;
    Ok(Json(ApiResponse::ok(report)))
}

/// POST /_offcache/unregister
pub async fn unregister<F: Fetcher>(
    State(state): State<AppState<F>>,
) -> Result<Json<ApiResponse<UnregisterBody>>, ProxyError> {
    let deleted = state.registration.unregister().await?;
    Ok(Json(ApiResponse::ok(UnregisterBody { deleted })))
}
