//! Outgoing requests as seen by the controller.

use bytes::Bytes;
use url::Url;

/// How the page issued the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level document load.
    Navigate,
    /// Anything else (subresources, `fetch()` calls).
    #[default]
    Default,
}

/// HTTP cache behaviour requested from the fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    /// Force revalidation with the origin and bypass intermediate HTTP caches.
    NoCache,
}

/// A request flowing through the controller.
#[derive(Debug, Clone)]
pub struct Request {
    /// Upper-case HTTP method.
    pub method: String,
    /// Absolute, canonical URL.
    pub url: Url,
    pub mode: RequestMode,
    pub cache: CacheMode,
    /// Request headers, end-to-end only.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Request {
    /// Create a request with an arbitrary method.
    pub fn new(method: &str, url: Url) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url,
            mode: RequestMode::Default,
            cache: CacheMode::Default,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// A plain GET subresource request.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// A GET request loading a top-level document.
    pub fn navigate(url: Url) -> Self {
        Self { mode: RequestMode::Navigate, ..Self::get(url) }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_cache_mode(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The cache key for this request: the URL without its fragment.
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }
}
