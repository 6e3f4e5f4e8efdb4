//! Offline cache controller.
//!
//! Intercepts every request the page issues, classifies it, and settles it
//! with one of three policies while keeping a versioned cache store warm:
//!
//! | Kind | Policy | Last resort |
//! |------|--------|-------------|
//! | navigation | network-first | cached `/` |
//! | `.json` data | network-first, `no-cache` | synthetic `{}` |
//! | asset | stale-while-revalidate | error |
//!
//! Cross-origin and non-GET requests are handed back untouched.
//!
//! Cache storage failures never fail a request: reads degrade to misses and
//! writes are logged and dropped.

mod classify;
mod lifecycle;
mod registration;
#[cfg(test)]
mod scenarios;
mod strategy;

use std::sync::Arc;

use offcache_core::cache::store_name;
use offcache_core::{AppConfig, CacheDb, Error, Request, Response};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use url::Url;

use crate::fetch::{Fetcher, canonicalize, resolve, same_origin};

pub use classify::RequestKind;
pub use lifecycle::{ActivateReport, InstallReport};
pub use registration::{RegisterReport, Registration};

/// Identity and manifest of one controller version.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub namespace: String,
    pub version: String,
    /// The application's own origin.
    pub origin: Url,
    /// Root-relative URLs cached at install time.
    pub precache: Vec<String>,
}

impl ControllerSettings {
    pub fn new(namespace: impl Into<String>, version: impl Into<String>, origin: Url) -> Self {
        Self { namespace: namespace.into(), version: version.into(), origin, precache: Vec::new() }
    }

    pub fn with_precache<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Build settings from loaded configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = canonicalize(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self::new(&config.namespace, &config.version, origin).with_precache(config.precache.iter().cloned()))
    }

    /// `{namespace}-{version}`.
    pub fn cache_name(&self) -> String {
        store_name(&self.namespace, &self.version)
    }
}

/// Where a settled response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Live network response.
    Network,
    /// Cached response for the exact request URL.
    Cache,
    /// Cached app shell served for a failed navigation.
    RootFallback,
    /// Synthetic `{}` served for failed JSON data.
    EmptyJson,
    /// No controller intervened.
    Passthrough,
}

/// A request resolved to exactly one response.
#[derive(Debug, Clone)]
pub struct Settled {
    pub response: Response,
    pub source: ResponseSource,
}

impl Settled {
    fn new(response: Response, source: ResponseSource) -> Self {
        Self { response, source }
    }
}

/// Outcome of [`Controller::handle_fetch`].
#[derive(Debug)]
pub enum Intercept {
    /// Not ours; the caller performs the plain network fetch.
    Bypass(Request),
    Respond(Settled),
}

/// One installed version of the cache policy.
pub struct Controller<F: Fetcher> {
    settings: ControllerSettings,
    cache_name: String,
    db: CacheDb,
    fetcher: Arc<F>,
    revalidations: Mutex<JoinSet<()>>,
}

impl<F: Fetcher> Controller<F> {
    pub fn new(settings: ControllerSettings, db: CacheDb, fetcher: Arc<F>) -> Self {
        let cache_name = settings.cache_name();
        Self { settings, cache_name, db, fetcher, revalidations: Mutex::new(JoinSet::new()) }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Name of the store this version reads and writes.
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Intercept one request.
    ///
    /// Returns `Intercept::Bypass` for cross-origin and non-GET requests.
    /// Errors only when a request has no fallback at all: an asset with
    /// neither cache nor network, or a navigation with neither the exact URL
    /// nor `/` cached.
    pub async fn handle_fetch(&self, request: Request) -> Result<Intercept, Error> {
        if !same_origin(&request.url, &self.settings.origin) {
            tracing::trace!(url = %request.url, "cross-origin request bypassed");
            return Ok(Intercept::Bypass(request));
        }
        if !request.is_get() {
            tracing::trace!(method = %request.method, url = %request.url, "non-GET request bypassed");
            return Ok(Intercept::Bypass(request));
        }

        let kind = RequestKind::classify(&request);
        let settled = match kind {
            RequestKind::Navigation => self.navigation(request).await?,
            RequestKind::Json => self.json_data(request).await,
            RequestKind::Asset => self.stale_while_revalidate(request).await?,
        };

        tracing::debug!(
            kind = ?kind,
            source = ?settled.source,
            status = settled.response.status,
            url = %settled.response.url,
            "request settled"
        );

        Ok(Intercept::Respond(settled))
    }

    /// Wait for every background revalidation started so far.
    pub async fn settle(&self) {
        let mut tasks = self.revalidations.lock().await;
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "revalidation task failed");
            }
        }
    }

    /// Cache key of the app shell.
    fn root_key(&self) -> Result<String, Error> {
        resolve(&self.settings.origin, "/")
            .map(|url| url.to_string())
            .map_err(|e| Error::InvalidUrl(e.to_string()))
    }

    /// Read from this version's store; storage errors count as a miss.
    async fn lookup(&self, key: &str) -> Option<Response> {
        match self.db.match_entry(&self.cache_name, key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(store = %self.cache_name, url = key, error = %e, "cache read failed");
                None
            }
        }
    }

    /// Write to this version's store; storage errors are dropped.
    async fn store(&self, key: &str, response: &Response) {
        store_in(&self.db, &self.cache_name, key, response).await;
    }
}

async fn store_in(db: &CacheDb, store: &str, key: &str, response: &Response) {
    if let Err(e) = db.put(store, key, response).await {
        tracing::warn!(store, url = key, error = %e, "cache write failed");
    }
}
