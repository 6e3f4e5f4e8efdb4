//! SQLite-backed named cache storage.
//!
//! This module provides versioned, namespaced cache stores mapping request
//! URLs to buffered responses, with async access via tokio-rusqlite. It
//! supports:
//!
//! - Store lifecycle (open, list, delete, delete all)
//! - Atomic per-key put/match using UPSERT
//! - Entry metadata lookup by URL or key hash
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use hash::is_valid_key;
pub use entries::CacheEntry;
pub use stores::{StoreInfo, is_namespace_store, store_name};
