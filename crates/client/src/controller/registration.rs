//! Registration: the application's control surface over the controller.
//!
//! `register` installs a version, activates it right away and claims every
//! subsequent request. `unregister` is the escape hatch for a cache that no
//! longer matches the deployed build: it drops the controller and purges
//! every cache store.

use std::sync::Arc;

use offcache_core::{CacheDb, Error, Request};
use serde::Serialize;
use tokio::sync::RwLock;

use super::{ActivateReport, Controller, ControllerSettings, InstallReport, Intercept, ResponseSource, Settled};
use crate::fetch::Fetcher;

/// Result of [`Registration::register`].
#[derive(Debug, Clone, Serialize)]
pub struct RegisterReport {
    pub version: String,
    pub install: InstallReport,
    pub activate: ActivateReport,
    pub registered_at: String,
}

/// Holds the active controller, if any.
pub struct Registration<F: Fetcher> {
    db: CacheDb,
    fetcher: Arc<F>,
    active: RwLock<Option<Arc<Controller<F>>>>,
}

impl<F: Fetcher> Registration<F> {
    pub fn new(db: CacheDb, fetcher: Arc<F>) -> Self {
        Self { db, fetcher, active: RwLock::new(None) }
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    /// Install and activate `settings`, then route requests through it.
    ///
    /// Registering a new version replaces the previous controller; its
    /// store is purged by the activation.
    pub async fn register(&self, settings: ControllerSettings) -> Result<RegisterReport, Error> {
        let version = settings.version.clone();
        let controller = Arc::new(Controller::new(settings, self.db.clone(), Arc::clone(&self.fetcher)));

        let install = controller.install().await?;
        let activate = controller.activate().await?;

        let previous = self.active.write().await.replace(Arc::clone(&controller));
        if let Some(previous) = previous {
            tracing::info!(from = %previous.cache_name(), to = %controller.cache_name(), "controller replaced");
        }

        Ok(RegisterReport { version, install, activate, registered_at: chrono::Utc::now().to_rfc3339() })
    }

    /// The controller currently in charge.
    pub async fn active(&self) -> Option<Arc<Controller<F>>> {
        self.active.read().await.clone()
    }

    /// Like [`Registration::active`], but an error when nothing is registered.
    pub async fn controller(&self) -> Result<Arc<Controller<F>>, Error> {
        self.active().await.ok_or(Error::NotRegistered)
    }

    /// Drop the controller and delete every cache store.
    ///
    /// Returns the number of stores deleted. Safe to call when nothing is
    /// registered.
    pub async fn unregister(&self) -> Result<u64, Error> {
        let previous = self.active.write().await.take();
        if let Some(controller) = &previous {
            controller.settle().await;
        }

        let deleted = self.db.delete_all_stores().await?;
        tracing::info!(
            was_active = previous.is_some(),
            deleted,
            "unregistered and purged all cache stores"
        );
        Ok(deleted)
    }

    /// Settle a request: through the active controller when there is one,
    /// straight to the network otherwise or when the controller bypasses.
    pub async fn handle(&self, request: Request) -> Result<Settled, Error> {
        let request = match self.active().await {
            Some(controller) => match controller.handle_fetch(request).await? {
                Intercept::Respond(settled) => return Ok(settled),
                Intercept::Bypass(request) => request,
            },
            None => request,
        };

        let response = self.fetcher.fetch(&request).await?;
        Ok(Settled::new(response, ResponseSource::Passthrough))
    }
}
