//! Install and activate phases.

use offcache_core::Error;
use offcache_core::cache::is_namespace_store;
use serde::Serialize;

use super::Controller;
use crate::fetch::{Fetcher, resolve};
use offcache_core::Request;

/// What an install cached and what it could not.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub store: String,
    /// Absolute URLs now in the store.
    pub cached: Vec<String>,
    /// Manifest entries that failed, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Stores removed by an activation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivateReport {
    pub store: String,
    pub purged: Vec<String>,
}

impl<F: Fetcher> Controller<F> {
    /// Open this version's store and precache the manifest.
    ///
    /// Best-effort: a manifest entry that cannot be resolved, fetched, or
    /// stored, or that answers with a status other than 200, is recorded in
    /// `failed` and installation carries on.
    ///
    /// # Errors
    ///
    /// Fails only if the store itself cannot be opened.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let created = self.db.open_store(&self.cache_name).await?;
        tracing::info!(store = %self.cache_name, created, entries = self.settings.precache.len(), "installing");

        let mut report = InstallReport { store: self.cache_name.clone(), ..Default::default() };

        for entry in &self.settings.precache {
            match self.precache_one(entry).await {
                Ok(url) => report.cached.push(url),
                Err(e) => {
                    tracing::warn!(store = %self.cache_name, entry = %entry, error = %e, "precache failed");
                    report.failed.push((entry.clone(), e.to_string()));
                }
            }
        }

        tracing::info!(
            store = %self.cache_name,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "installed"
        );

        Ok(report)
    }

    async fn precache_one(&self, entry: &str) -> Result<String, Error> {
        let url = resolve(&self.settings.origin, entry).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let request = Request::get(url);
        let key = request.cache_key();

        let response = self.fetcher.fetch(&request).await?;
        if !response.is_cacheable() {
            return Err(Error::Network(format!("{key}: status {}", response.status)));
        }

        self.db.put(&self.cache_name, &key, &response).await?;
        Ok(key)
    }

    /// Delete every store of this namespace other than the current one.
    ///
    /// Stores outside the namespace are left alone. Running it again with
    /// the same version is a no-op.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let mut report = ActivateReport { store: self.cache_name.clone(), ..Default::default() };

        for name in self.db.store_names().await? {
            if name != self.cache_name && is_namespace_store(&name, &self.settings.namespace) {
                if self.db.delete_store(&name).await? {
                    tracing::info!(store = %name, current = %self.cache_name, "purged stale store");
                }
                report.purged.push(name);
            }
        }

        tracing::info!(store = %self.cache_name, purged = report.purged.len(), "activated");

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::testing::*;
    use super::super::{Controller, ControllerSettings};
    use crate::fetch::StubFetcher;
    use offcache_core::CacheDb;
    use offcache_core::cache::is_namespace_store;

    fn manifest_stub() -> StubFetcher {
        let stub = StubFetcher::new();
        stub.route(&abs("/"), 200, "<html>shell</html>");
        stub.route(&abs("/images/logo.webp"), 200, "webp");
        stub.route(&abs("/clinics_en.json"), 200, "[]");
        stub
    }

    fn with_manifest(settings: ControllerSettings) -> ControllerSettings {
        settings.with_precache(["/", "/images/logo.webp", "/clinics_en.json"])
    }

    #[tokio::test]
    async fn test_install_caches_whole_manifest() {
        let stub = manifest_stub();
        let db = CacheDb::open_in_memory().await.unwrap();
        let controller = Controller::new(with_manifest(settings("app", "v4")), db.clone(), Arc::new(stub));

        let report = controller.install().await.unwrap();

        assert_eq!(report.store, "app-v4");
        assert!(report.failed.is_empty());
        assert_eq!(
            db.entry_urls("app-v4").await.unwrap(),
            vec![abs("/"), abs("/images/logo.webp"), abs("/clinics_en.json")]
        );
    }

    #[tokio::test]
    async fn test_install_is_best_effort() {
        let stub = manifest_stub();
        stub.fail(&abs("/images/logo.webp"));
        let db = CacheDb::open_in_memory().await.unwrap();
        let controller = Controller::new(with_manifest(settings("app", "v4")), db.clone(), Arc::new(stub));

        let report = controller.install().await.unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "/images/logo.webp");
        assert_eq!(db.entry_urls("app-v4").await.unwrap(), vec![abs("/"), abs("/clinics_en.json")]);
    }

    #[tokio::test]
    async fn test_install_skips_error_statuses() {
        let stub = manifest_stub();
        stub.route(&abs("/clinics_en.json"), 404, "not found");
        let db = CacheDb::open_in_memory().await.unwrap();
        let controller = Controller::new(with_manifest(settings("app", "v4")), db.clone(), Arc::new(stub));

        let report = controller.install().await.unwrap();

        assert_eq!(report.cached.len(), 2);
        assert!(db.match_entry("app-v4", &abs("/clinics_en.json")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_install_with_network_down_still_opens_store() {
        let stub = manifest_stub();
        stub.set_offline(true);
        let db = CacheDb::open_in_memory().await.unwrap();
        let controller = Controller::new(with_manifest(settings("app", "v4")), db.clone(), Arc::new(stub));

        let report = controller.install().await.unwrap();

        assert_eq!(report.failed.len(), 3);
        assert!(db.has_store("app-v4").await.unwrap());
    }

    #[tokio::test]
    async fn test_activate_purges_stale_namespace_stores() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for name in ["app-v3", "app-v4", "other-namespace-x"] {
            db.open_store(name).await.unwrap();
        }
        let controller = Controller::new(settings("app", "v4"), db.clone(), Arc::new(StubFetcher::new()));

        let report = controller.activate().await.unwrap();

        assert_eq!(report.purged, vec!["app-v3".to_string()]);
        assert_eq!(db.store_names().await.unwrap(), vec!["app-v4", "other-namespace-x"]);
    }

    #[tokio::test]
    async fn test_activate_leaves_exactly_one_namespace_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for name in ["app-v1", "app-v2", "app-v3"] {
            db.open_store(name).await.unwrap();
        }
        let controller = Controller::new(settings("app", "v4"), db.clone(), Arc::new(StubFetcher::new()));
        controller.install().await.unwrap();
        controller.activate().await.unwrap();

        let ours: Vec<String> = db
            .store_names()
            .await
            .unwrap()
            .into_iter()
            .filter(|name| is_namespace_store(name, "app"))
            .collect();
        assert_eq!(ours, vec!["app-v4".to_string()]);
    }

    #[tokio::test]
    async fn test_activate_twice_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_store("app-v3").await.unwrap();
        let controller = Controller::new(settings("app", "v4"), db.clone(), Arc::new(StubFetcher::new()));
        controller.install().await.unwrap();

        controller.activate().await.unwrap();
        let second = controller.activate().await.unwrap();

        assert!(second.purged.is_empty());
        assert_eq!(db.store_names().await.unwrap(), vec!["app-v4"]);
    }
}
