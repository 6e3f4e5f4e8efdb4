//! Per-kind caching policies.

use std::sync::Arc;

use offcache_core::{CacheMode, Error, Request, Response};

use super::{Controller, ResponseSource, Settled, store_in};
use crate::fetch::Fetcher;

impl<F: Fetcher> Controller<F> {
    /// Network-first for documents.
    ///
    /// The fallback chain is the exact URL, then the cached app shell, so a
    /// failed navigation always lands on one coherent version of the app.
    pub(super) async fn navigation(&self, request: Request) -> Result<Settled, Error> {
        let key = request.cache_key();

        let err = match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.store(&key, &response).await;
                }
                return Ok(Settled::new(response, ResponseSource::Network));
            }
            Err(e) => e,
        };

        tracing::debug!(url = %key, error = %err, "navigation fetch failed, trying cache");

        if let Some(cached) = self.lookup(&key).await {
            return Ok(Settled::new(cached, ResponseSource::Cache));
        }
        if let Some(shell) = self.lookup(&self.root_key()?).await {
            return Ok(Settled::new(shell, ResponseSource::RootFallback));
        }

        Err(err)
    }

    /// Network-first for data files, revalidating past any HTTP cache.
    ///
    /// Never fails: with neither network nor cache the page gets `{}`.
    pub(super) async fn json_data(&self, request: Request) -> Settled {
        let key = request.cache_key();
        let request = request.with_cache_mode(CacheMode::NoCache);

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.store(&key, &response).await;
                }
                Settled::new(response, ResponseSource::Network)
            }
            Err(e) => {
                tracing::debug!(url = %key, error = %e, "data fetch failed, trying cache");
                match self.lookup(&key).await {
                    Some(cached) => Settled::new(cached, ResponseSource::Cache),
                    None => Settled::new(Response::empty_json(key), ResponseSource::EmptyJson),
                }
            }
        }
    }

    /// Stale-while-revalidate for static assets.
    ///
    /// A cached copy is returned at once while a detached task refreshes
    /// it. Only a 200 replaces the cached copy.
    pub(super) async fn stale_while_revalidate(&self, request: Request) -> Result<Settled, Error> {
        let key = request.cache_key();

        if let Some(cached) = self.lookup(&key).await {
            self.spawn_revalidation(request, key).await;
            return Ok(Settled::new(cached, ResponseSource::Cache));
        }

        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.store(&key, &response).await;
                }
                Ok(Settled::new(response, ResponseSource::Network))
            }
            Err(e) => match self.lookup(&key).await {
                Some(cached) => Ok(Settled::new(cached, ResponseSource::Cache)),
                None => Err(e),
            },
        }
    }

    async fn spawn_revalidation(&self, request: Request, key: String) {
        let fetcher = Arc::clone(&self.fetcher);
        let db = self.db.clone();
        let store = self.cache_name.clone();

        let mut tasks = self.revalidations.lock().await;
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(response) if response.is_cacheable() => {
                    store_in(&db, &store, &key, &response).await;
                    tracing::debug!(url = %key, "revalidated");
                }
                Ok(response) => {
                    tracing::debug!(url = %key, status = response.status, "revalidation kept cached copy");
                }
                Err(e) => {
                    tracing::debug!(url = %key, error = %e, "revalidation failed");
                }
            }
        });
    }
}
