//! Cache entry operations.
//!
//! Entries map a request URL to a buffered response inside one named store.
//! Every write is a single UPSERT, so concurrent puts to distinct URLs never
//! interfere and a put to the same URL replaces the entry atomically.

use super::connection::CacheDb;
use super::hash::{compute_entry_key, is_valid_key};
use crate::{Error, Response};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Metadata of a stored entry, without its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key_hash: String,
    pub store: String,
    pub url: String,
    pub method: String,
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body_len: usize,
    pub stored_at: String,
}

const SELECT_RESPONSE: &str = "SELECT url, status_code, headers_json, body FROM cache_entries";

fn row_to_response(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, u16, String, Vec<u8>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

const SELECT_ENTRY: &str = "SELECT e.key_hash, e.store, e.url, e.method, e.status_code, e.headers_json,
        length(e.body), e.stored_at
     FROM cache_entries e";

type EntryRow = (String, String, String, String, u16, String, i64, String);

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn decode_entry(
    (key_hash, store, url, method, status_code, headers_json, body_len, stored_at): EntryRow,
) -> Result<CacheEntry, Error> {
    Ok(CacheEntry {
        key_hash,
        store,
        url,
        method,
        status_code,
        headers: serde_json::from_str(&headers_json)?,
        body_len: usize::try_from(body_len).unwrap_or_default(),
        stored_at,
    })
}

fn decode_response((url, status, headers_json, body): (String, u16, String, Vec<u8>)) -> Result<Response, Error> {
    let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
    Ok(Response { url, status, headers, body: Bytes::from(body) })
}

impl CacheDb {
    /// Store a response under `url` in `store`.
    ///
    /// Uses UPSERT semantics: inserts if the URL is new to the store,
    /// replaces the stored response if it isn't.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownStore` if the store was never opened or has been
    /// deleted; a deleted store is never resurrected by a late write.
    pub async fn put(&self, store: &str, url: &str, response: &Response) -> Result<(), Error> {
        let store = store.to_string();
        let url = url.to_string();
        let key_hash = compute_entry_key(&store, &url);
        let headers_json = serde_json::to_string(&response.headers)?;
        let status = response.status;
        let body = response.body.to_vec();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let open: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)",
                    params![&store],
                    |row| row.get(0),
                )?;
                if !open {
                    return Err(Error::UnknownStore(store));
                }
                conn.execute(
                    "INSERT INTO cache_entries (
                        key_hash, store, url, method, status_code, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, 'GET', ?4, ?5, ?6, ?7)
                    ON CONFLICT(key_hash) DO UPDATE SET
                        status_code = excluded.status_code,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![key_hash, store, url, status, headers_json, body, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up `url` in one store.
    ///
    /// Returns None if the store or the entry doesn't exist.
    pub async fn match_entry(&self, store: &str, url: &str) -> Result<Option<Response>, Error> {
        let key_hash = compute_entry_key(store, url);
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt = conn.prepare(&format!("{SELECT_RESPONSE} WHERE key_hash = ?1"))?;
                match stmt.query_row(params![key_hash], row_to_response) {
                    Ok(row) => decode_response(row).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Find the metadata of `url` across every store, oldest store first.
    pub async fn find_entry(&self, url: &str) -> Result<Option<CacheEntry>, Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "{SELECT_ENTRY} JOIN cache_stores s ON s.name = e.store
                     WHERE e.url = ?1
                     ORDER BY s.created_at ASC, s.rowid ASC
                     LIMIT 1"
                ))?;
                match stmt.query_row(params![url], row_to_entry) {
                    Ok(row) => decode_entry(row).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Get entry metadata by key hash.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHash` if `key_hash` is not a 64-char hex string.
    pub async fn get_entry(&self, key_hash: &str) -> Result<Option<CacheEntry>, Error> {
        if !is_valid_key(key_hash) {
            return Err(Error::InvalidHash);
        }
        let key_hash = key_hash.to_ascii_lowercase();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(&format!("{SELECT_ENTRY} WHERE e.key_hash = ?1"))?;
                match stmt.query_row(params![key_hash], row_to_entry) {
                    Ok(row) => decode_entry(row).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in a store, in insertion order.
    pub async fn entry_urls(&self, store: &str) -> Result<Vec<String>, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM cache_entries WHERE store = ?1 ORDER BY rowid ASC")?;
                let urls = stmt
                    .query_map(params![store], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(url: &str, body: &'static str) -> Response {
        Response::new(url, 200)
            .with_header("Content-Type", "text/html")
            .with_body(body)
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let url = "https://example.com/";
        db.open_store("app-v4").await.unwrap();
        db.put("app-v4", url, &html(url, "<html>v4</html>")).await.unwrap();

        let cached = db.match_entry("app-v4", url).await.unwrap().unwrap();
        assert_eq!(cached.status, 200);
        assert_eq!(cached.content_type(), Some("text/html"));
        assert_eq!(&cached.body[..], b"<html>v4</html>");
    }

    #[tokio::test]
    async fn test_put_requires_open_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.put("app-v4", "https://example.com/", &html("https://example.com/", "")).await;
        assert!(matches!(result, Err(Error::UnknownStore(name)) if name == "app-v4"));
        assert!(!db.has_store("app-v4").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_after_delete_does_not_resurrect_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_store("app-v3").await.unwrap();
        db.delete_store("app-v3").await.unwrap();

        let url = "https://example.com/app.js";
        assert!(db.put("app-v3", url, &Response::new(url, 200)).await.is_err());
        assert!(db.store_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_replaces_existing_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let url = "https://example.com/";
        db.open_store("app-v4").await.unwrap();
        db.put("app-v4", url, &html(url, "<html>v4</html>")).await.unwrap();
        db.put("app-v4", url, &html(url, "<html>v5</html>")).await.unwrap();

        let cached = db.match_entry("app-v4", url).await.unwrap().unwrap();
        assert_eq!(&cached.body[..], b"<html>v5</html>");
        assert_eq!(db.entry_urls("app-v4").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.match_entry("app-v4", "https://example.com/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_match_is_scoped_to_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let url = "https://example.com/";
        db.open_store("app-v3").await.unwrap();
        db.put("app-v3", url, &html(url, "old")).await.unwrap();

        assert!(db.match_entry("app-v4", url).await.unwrap().is_none());
        assert_eq!(db.find_entry(url).await.unwrap().unwrap().store, "app-v3");
    }

    #[tokio::test]
    async fn test_delete_store_cascades_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let url = "https://example.com/";
        db.open_store("app-v3").await.unwrap();
        db.put("app-v3", url, &html(url, "old")).await.unwrap();

        db.delete_store("app-v3").await.unwrap();
        assert!(db.find_entry(url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_entry_metadata() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let url = "https://example.com/clinics_en.json";
        let resp = Response::new(url, 200)
            .with_header("Content-Type", "application/json")
            .with_body("[]");
        db.open_store("app-v4").await.unwrap();
        db.put("app-v4", url, &resp).await.unwrap();

        let key = compute_entry_key("app-v4", url);
        let entry = db.get_entry(&key).await.unwrap().unwrap();
        assert_eq!(entry.url, url);
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.body_len, 2);
        assert_eq!(entry.headers, vec![("Content-Type".to_string(), "application/json".to_string())]);
    }

    #[tokio::test]
    async fn test_get_entry_invalid_hash() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(matches!(db.get_entry("zz").await, Err(Error::InvalidHash)));
    }

    #[tokio::test]
    async fn test_find_entry_prefers_oldest_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let url = "https://example.com/images/logo.webp";
        db.open_store("app-v3").await.unwrap();
        db.open_store("app-v4").await.unwrap();
        db.put("app-v4", url, &Response::new(url, 200).with_body("new")).await.unwrap();
        db.put("app-v3", url, &Response::new(url, 200).with_body("older")).await.unwrap();

        let entry = db.find_entry(url).await.unwrap().unwrap();
        assert_eq!(entry.store, "app-v3");
        assert_eq!(entry.key_hash, compute_entry_key("app-v3", url));
        assert_eq!(entry.body_len, 5);
        assert_eq!(db.get_entry(&entry.key_hash).await.unwrap(), Some(entry));
    }
}
