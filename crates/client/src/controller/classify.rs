//! Request classification.

use offcache_core::Request;
use serde::Serialize;

/// Which caching policy a same-origin GET request falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Top-level document load: network-first, falling back to `/`.
    Navigation,
    /// Path ends in `.json`: network-first without HTTP caching, degrading to `{}`.
    Json,
    /// Everything else: stale-while-revalidate.
    Asset,
}

impl RequestKind {
    /// Classify a request. Navigation wins over the `.json` suffix.
    pub fn classify(request: &Request) -> Self {
        if request.is_navigation() {
            RequestKind::Navigation
        } else if request.url.path().ends_with(".json") {
            RequestKind::Json
        } else {
            RequestKind::Asset
        }
    }
}
