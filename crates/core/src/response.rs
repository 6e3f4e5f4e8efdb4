//! Responses returned to the page, either live or from a cache store.

use bytes::Bytes;

/// An HTTP response with a fully buffered body.
///
/// Buffering makes the response cheap to clone, which is how a response is
/// both stored and returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The URL this response answers.
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(url: impl Into<String>, status: u16) -> Self {
        Self { url: url.into(), status, headers: Vec::new(), body: Bytes::new() }
    }

    /// The synthetic payload served when JSON data is unavailable everywhere.
    pub fn empty_json(url: impl Into<String>) -> Self {
        Self::new(url, 200)
            .with_header("Content-Type", "application/json")
            .with_body("{}")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Whether this response may be written to a cache store.
    ///
    /// Only a complete `200 OK`; a `206 Partial Content` body is a slice of
    /// the resource and must never stand in for it.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json() {
        let resp = Response::empty_json("https://example.com/clinics_ar.json");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type(), Some("application/json"));
        let parsed: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(parsed, serde_json::json!({}));
    }

    #[test]
    fn test_is_cacheable() {
        assert!(Response::new("u", 200).is_cacheable());
        assert!(!Response::new("u", 204).is_cacheable());
        assert!(!Response::new("u", 206).is_cacheable());
        assert!(!Response::new("u", 304).is_cacheable());
        assert!(!Response::new("u", 404).is_cacheable());
    }

    #[test]
    fn test_header_lookup() {
        let resp = Response::new("u", 200).with_header("ETag", "\"abc\"");
        assert_eq!(resp.header("etag"), Some("\"abc\""));
        assert_eq!(resp.content_type(), None);
    }
}
