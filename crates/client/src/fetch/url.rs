//! URL canonicalization and origin checks.
//!
//! Cache keys are canonical absolute URLs, so every URL entering the
//! controller goes through [`canonicalize`] or [`resolve`] first.

use url::Url;

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize an absolute URL string.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let parsed = Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    normalize(parsed)
}

/// Resolve a request target against the application origin.
///
/// Root-relative targets (`/clinics_en.json`) land on the origin; absolute
/// targets keep their own origin, so cross-origin URLs stay cross-origin.
pub fn resolve(origin: &Url, target: &str) -> Result<Url, UrlError> {
    let trimmed = target.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = origin
        .join(trimmed)
        .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    normalize(parsed)
}

/// Whether two URLs share scheme, host and port.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

fn normalize(mut parsed: Url) -> Result<Url, UrlError> {
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let host = host.to_lowercase();
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://beautylandcard.com").unwrap()
    }

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("example.com").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://EXAMPLE.COM").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_canonicalize_remove_fragment_keep_query() {
        let url = canonicalize("https://example.com/menu?clinic=3#prices").unwrap();
        assert_eq!(url.path(), "/menu");
        assert_eq!(url.query(), Some("clinic=3"));
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_canonicalize_trim_whitespace() {
        let url = canonicalize("  https://example.com  ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert!(matches!(canonicalize(""), Err(UrlError::Empty)));
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_resolve_root_relative() {
        let url = resolve(&origin(), "/clinics_en.json").unwrap();
        assert_eq!(url.as_str(), "https://beautylandcard.com/clinics_en.json");
    }

    #[test]
    fn test_resolve_absolute_keeps_foreign_origin() {
        let url = resolve(&origin(), "https://analytics.example.com/collect").unwrap();
        assert_eq!(url.host_str(), Some("analytics.example.com"));
        assert!(!same_origin(&url, &origin()));
    }

    #[test]
    fn test_resolve_rejects_empty() {
        assert!(matches!(resolve(&origin(), " "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_same_origin_compares_port_and_scheme() {
        let a = Url::parse("http://localhost:8080/").unwrap();
        let b = Url::parse("http://localhost:8080/images/hero.webp").unwrap();
        let c = Url::parse("http://localhost:9090/").unwrap();
        let d = Url::parse("https://localhost:8080/").unwrap();
        assert!(same_origin(&a, &b));
        assert!(!same_origin(&a, &c));
        assert!(!same_origin(&a, &d));
    }
}
