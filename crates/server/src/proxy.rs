//! Intercepting proxy.
//!
//! Every request outside `/_offcache` is converted into a controller
//! request and settled through the active registration. Origin-form
//! targets are resolved against the application origin; absolute-form
//! targets (forward-proxy style) keep their own origin and therefore
//! bypass the cache when they point elsewhere.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{Request as HttpRequest, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    response::Response as HttpResponse,
    routing::{get, post},
};
use offcache_client::fetch::resolve;
use offcache_client::{ControllerSettings, Fetcher, Registration, Settled};
use offcache_core::{Request, RequestMode};

use crate::control;
use crate::error::ProxyError;

/// Headers that only make sense for a single transport hop.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Header reporting which policy branch produced a response.
pub const SOURCE_HEADER: &str = "x-offcache-source";

/// Shared proxy state.
pub struct AppState<F: Fetcher> {
    pub registration: Arc<Registration<F>>,
    pub settings: Arc<ControllerSettings>,
    pub max_body_bytes: usize,
}

impl<F: Fetcher> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            registration: Arc::clone(&self.registration),
            settings: Arc::clone(&self.settings),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

impl<F: Fetcher> AppState<F> {
    pub fn new(registration: Arc<Registration<F>>, settings: ControllerSettings, max_body_bytes: usize) -> Self {
        Self { registration, settings: Arc::new(settings), max_body_bytes }
    }
}

/// Build the proxy router.
pub fn router<F: Fetcher>(state: AppState<F>) -> Router {
    Router::new()
        .route("/_offcache/status", get(control::status::<F>))
        .route("/_offcache/register", post(control::register::<F>))
        .route("/_offcache/unregister", post(control::unregister::<F>))
        .fallback(proxy::<F>)
        .with_state(state)
}

/// Fallback handler: settle the request through the controller.
async fn proxy<F: Fetcher>(State(state): State<AppState<F>>, request: HttpRequest) -> Result<HttpResponse, ProxyError> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| ProxyError::InvalidInput(format!("failed to read request body: {e}")))?;

    let request = to_request(&state.settings, &parts.method, &parts.uri, &parts.headers, body)?;
    let settled = state.registration.handle(request).await?;

    Ok(into_http_response(settled))
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Whether the page is loading a top-level document.
fn is_navigation(method: &Method, headers: &HeaderMap) -> bool {
    if let Some(mode) = headers.get("sec-fetch-mode").and_then(|v| v.to_str().ok()) {
        return mode.eq_ignore_ascii_case("navigate");
    }
    *method == Method::GET
        && headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("text/html"))
}

/// Convert an incoming HTTP request into a controller request.
pub(crate) fn to_request(
    settings: &ControllerSettings, method: &Method, uri: &Uri, headers: &HeaderMap, body: Bytes,
) -> Result<Request, ProxyError> {
    let target = if uri.scheme().is_some() {
        uri.to_string()
    } else {
        uri.path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string())
    };

    let url = resolve(&settings.origin, &target).map_err(|e| ProxyError::InvalidInput(e.to_string()))?;

    let mut request = Request::new(method.as_str(), url).with_body(body);
    if is_navigation(method, headers) {
        request.mode = RequestMode::Navigate;
    }
    request.headers = headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    Ok(request)
}

/// Convert a settled response back into an HTTP response.
pub(crate) fn into_http_response(settled: Settled) -> HttpResponse {
    let Settled { response, source } = settled;

    let mut out = HttpResponse::new(Body::from(response.body));
    *out.status_mut() = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let headers = out.headers_mut();
    for (name, value) in &response.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::debug!(header = %name, "dropping unrepresentable response header"),
        }
    }

    let source = serde_json::to_value(source)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    if let Ok(value) = HeaderValue::from_str(&source) {
        headers.insert(SOURCE_HEADER, value);
    }

    out
}
