//! End-to-end flows through a registration, one per documented scenario.

use std::sync::Arc;

use offcache_core::{CacheDb, Request, Response};
use url::Url;

use super::testing::*;
use super::{Registration, ResponseSource};
use crate::fetch::StubFetcher;

async fn registration(stub: &StubFetcher) -> Registration<StubFetcher> {
    let db = CacheDb::open_in_memory().await.unwrap();
    Registration::new(db, Arc::new(stub.clone()))
}

#[tokio::test]
async fn test_install_caches_every_manifest_entry() {
    let stub = StubFetcher::new();
    stub.route(&abs("/"), 200, "<html>v4</html>");
    stub.route(&abs("/images/logo.webp"), 200, "logo");
    stub.route(&abs("/clinics_en.json"), 200, "[]");
    let reg = registration(&stub).await;

    reg.register(settings("app", "v4").with_precache(["/", "/images/logo.webp", "/clinics_en.json"]))
        .await
        .unwrap();

    let urls = reg.db().entry_urls("app-v4").await.unwrap();
    assert_eq!(urls, vec![abs("/"), abs("/images/logo.webp"), abs("/clinics_en.json")]);
}

#[tokio::test]
async fn test_activate_keeps_current_and_foreign_stores() {
    let stub = StubFetcher::new();
    let reg = registration(&stub).await;
    for name in ["app-v3", "app-v4", "other-namespace-x"] {
        reg.db().open_store(name).await.unwrap();
    }

    reg.register(settings("app", "v4")).await.unwrap();
    // Re-activating the same version changes nothing.
    reg.active().await.unwrap().activate().await.unwrap();

    assert_eq!(reg.db().store_names().await.unwrap(), vec!["app-v4", "other-namespace-x"]);
}

#[tokio::test]
async fn test_missing_data_file_degrades_to_empty_json() {
    let stub = StubFetcher::new();
    let reg = registration(&stub).await;
    reg.register(settings("app", "v4")).await.unwrap();

    let settled = reg.handle(Request::get(url("/clinics_ar.json"))).await.unwrap();

    assert_eq!(&settled.response.body[..], b"{}");
    assert_eq!(settled.response.content_type(), Some("application/json"));
}

#[tokio::test]
async fn test_navigation_refreshes_app_shell() {
    let stub = StubFetcher::new();
    stub.route(&abs("/"), 200, "<html>v4</html>");
    let reg = registration(&stub).await;
    reg.register(settings("app", "v4").with_precache(["/"])).await.unwrap();

    stub.route(&abs("/"), 200, "<html>v5</html>");
    let settled = reg.handle(Request::navigate(url("/"))).await.unwrap();

    assert_eq!(&settled.response.body[..], b"<html>v5</html>");
    let cached = reg.db().match_entry("app-v4", &abs("/")).await.unwrap().unwrap();
    assert_eq!(&cached.body[..], b"<html>v5</html>");
}

#[tokio::test]
async fn test_stale_image_is_served_then_replaced() {
    let stub = StubFetcher::new();
    let reg = registration(&stub).await;
    reg.register(settings("app", "v4")).await.unwrap();
    let hero = abs("/images/hero.webp");
    reg.db()
        .put("app-v4", &hero, &Response::new(&hero, 200).with_body("hero-old"))
        .await
        .unwrap();
    stub.route(&hero, 200, "hero-new");

    let first = reg.handle(Request::get(url("/images/hero.webp"))).await.unwrap();
    assert_eq!(first.source, ResponseSource::Cache);
    assert_eq!(&first.response.body[..], b"hero-old");

    reg.active().await.unwrap().settle().await;

    let second = reg.handle(Request::get(url("/images/hero.webp"))).await.unwrap();
    assert_eq!(&second.response.body[..], b"hero-new");
}

#[tokio::test]
async fn test_third_party_tracker_is_never_cached() {
    let stub = StubFetcher::new();
    let tracker = "https://analytics.example.com/collect";
    stub.route(tracker, 200, "ok");
    let reg = registration(&stub).await;
    reg.register(settings("app", "v4")).await.unwrap();

    assert!(reg.db().find_entry(tracker).await.unwrap().is_none());
    let settled = reg.handle(Request::get(Url::parse(tracker).unwrap())).await.unwrap();
    assert_eq!(settled.source, ResponseSource::Passthrough);
    assert!(reg.db().find_entry(tracker).await.unwrap().is_none());
}
