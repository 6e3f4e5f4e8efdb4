//! Command implementations. Each returns the JSON document to print.

use std::sync::Arc;

use anyhow::{Context, Result};
use offcache_client::fetch::resolve;
use offcache_client::{ControllerSettings, FetchClient, FetchConfig, Registration};
use offcache_core::cache::is_valid_key;
use offcache_core::{AppConfig, CacheDb, CacheEntry, Error, Request};
use serde_json::{Value, json};
use url::Url;

use crate::args::Command;

pub async fn run(command: Command) -> Result<Value> {
    let config = AppConfig::load()?;
    let settings = ControllerSettings::from_config(&config)?;
    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache database {}", config.db_path.display()))?;

    match command {
        Command::Register => {
            let registration = registration(&config, db)?;
            let report = registration.register(settings).await?;
            Ok(serde_json::to_value(report)?)
        }
        Command::Unregister => {
            let registration = registration(&config, db)?;
            let deleted = registration.unregister().await?;
            Ok(json!({ "deleted": deleted }))
        }
        Command::Stores => Ok(serde_json::to_value(db.list_stores().await?)?),
        Command::Lookup { target } => Ok(serde_json::to_value(lookup(&db, &settings.origin, &target).await?)?),
        Command::Fetch { url, navigate } => {
            let target = resolve(&settings.origin, &url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
            let request = if navigate { Request::navigate(target) } else { Request::get(target) };

            let registration = registration(&config, db)?;
            registration.register(settings).await?;
            let settled = registration.handle(request).await?;
            registration.controller().await?.settle().await;

            Ok(json!({
                "url": settled.response.url,
                "source": settled.source,
                "status": settled.response.status,
                "content_type": settled.response.content_type(),
                "bytes": settled.response.body.len(),
            }))
        }
    }
}

/// Resolve a lookup target: an entry key hash goes straight to the row,
/// anything else is treated as a URL and searched across every store.
async fn lookup(db: &CacheDb, origin: &Url, target: &str) -> Result<CacheEntry, Error> {
    let found = if is_valid_key(target) {
        db.get_entry(target).await?
    } else {
        let url = resolve(origin, target).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        db.find_entry(url.as_str()).await?
    };
    found.ok_or_else(|| Error::CacheMiss(target.to_string()))
}

fn registration(config: &AppConfig, db: CacheDb) -> Result<Registration<FetchClient>> {
    let fetcher = FetchClient::new(FetchConfig::from(config))?;
    Ok(Registration::new(db, Arc::new(fetcher)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use offcache_core::Response;
    use offcache_core::cache::hash::compute_entry_key;

    const ORIGIN: &str = "https://beautylandcard.com";

    async fn seeded() -> (CacheDb, Url) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let url = format!("{ORIGIN}/clinics_en.json");
        db.open_store("beauty-land-card-v4").await.unwrap();
        db.put("beauty-land-card-v4", &url, &Response::new(&url, 200).with_body("[]"))
            .await
            .unwrap();
        (db, Url::parse(ORIGIN).unwrap())
    }

    #[tokio::test]
    async fn test_lookup_by_path() {
        let (db, origin) = seeded().await;
        let entry = lookup(&db, &origin, "/clinics_en.json").await.unwrap();
        assert_eq!(entry.store, "beauty-land-card-v4");
        assert_eq!(entry.status_code, 200);
        assert_eq!(entry.body_len, 2);
    }

    #[tokio::test]
    async fn test_lookup_by_key_hash() {
        let (db, origin) = seeded().await;
        let key = compute_entry_key("beauty-land-card-v4", &format!("{ORIGIN}/clinics_en.json"));
        let entry = lookup(&db, &origin, &key).await.unwrap();
        assert_eq!(entry.key_hash, key);
        assert_eq!(entry.url, format!("{ORIGIN}/clinics_en.json"));
    }

    #[tokio::test]
    async fn test_lookup_miss() {
        let (db, origin) = seeded().await;
        let result = lookup(&db, &origin, "/clinics_ar.json").await;
        assert!(matches!(result, Err(Error::CacheMiss(_))));
    }
}
