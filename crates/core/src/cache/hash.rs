//! Cache entry key generation.

use sha2::{Digest, Sha256};

/// Compute the primary key of a cache entry: one key per (store, URL) pair.
pub fn compute_entry_key(store: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(store.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check that a string looks like a key produced by [`compute_entry_key`].
pub fn is_valid_key(key: &str) -> bool {
    key.len() == 64 && key.chars().all(|c| c.is_ascii_hexdigit())
}
