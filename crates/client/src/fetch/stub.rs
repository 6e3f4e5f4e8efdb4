//! Scriptable in-memory fetcher.
//!
//! Routes are keyed by absolute URL. Unrouted URLs and URLs marked offline
//! reject with `NETWORK_ERROR`, the same way an unreachable network does.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use offcache_core::{CacheMode, Error, Request, Response};
use tokio::sync::Semaphore;

use super::Fetcher;

#[derive(Default)]
struct State {
    routes: HashMap<String, Response>,
    offline: bool,
    calls: Vec<(String, CacheMode)>,
}

/// A [`Fetcher`] answering from a routing table.
#[derive(Clone, Default)]
pub struct StubFetcher {
    state: Arc<Mutex<State>>,
    gate: Option<Arc<Semaphore>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fetcher whose calls block until [`StubFetcher::release`] hands out a permit.
    pub fn gated() -> Self {
        Self { gate: Some(Arc::new(Semaphore::new(0))), ..Self::default() }
    }

    /// Let `n` blocked or future fetches through.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer `url` with `status` and `body`.
    pub fn route(&self, url: &str, status: u16, body: &str) {
        let response = Response::new(url, status).with_body(body.to_string());
        self.route_response(url, response);
    }

    pub fn route_response(&self, url: &str, response: Response) {
        self.state().routes.insert(url.to_string(), response);
    }

    /// Make `url` unreachable.
    pub fn fail(&self, url: &str) {
        self.state().routes.remove(url);
    }

    /// Reject every fetch until turned back on.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.iter().map(|(url, _)| url.clone()).collect()
    }

    /// Cache modes requested so far, in call order.
    pub fn cache_modes(&self) -> Vec<CacheMode> {
        self.state().calls.iter().map(|(_, mode)| *mode).collect()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| Error::Network(e.to_string()))?;
            permit.forget();
        }

        let url = request.url.to_string();
        let mut state = self.state();
        state.calls.push((url.clone(), request.cache));
        if state.offline {
            return Err(Error::Network(format!("{url}: offline")));
        }
        state
            .routes
            .get(&url)
            .cloned()
            .ok_or_else(|| Error::Network(format!("{url}: connection refused")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[tokio::test]
    async fn test_routed_and_unrouted() {
        let stub = StubFetcher::new();
        stub.route("https://example.com/", 200, "<html></html>");

        let ok = stub.fetch(&Request::get(Url::parse("https://example.com/").unwrap())).await.unwrap();
        assert_eq!(&ok.body[..], b"<html></html>");

        let err = stub
            .fetch(&Request::get(Url::parse("https://example.com/missing").unwrap()))
            .await
            .unwrap_err();
        assert!(err.is_network());
        assert_eq!(stub.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_offline() {
        let stub = StubFetcher::new();
        stub.route("https://example.com/", 200, "");
        stub.set_offline(true);
        assert!(stub.fetch(&Request::get(Url::parse("https://example.com/").unwrap())).await.is_err());
    }
}
