//! Core types and shared functionality for offcache.
//!
//! This crate provides:
//! - Named cache storage with a SQLite backend
//! - The request/response model shared by the controller, proxy and CLI
//! - Unified error types
//! - Layered configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod request;
pub mod response;

pub use cache::{CacheDb, CacheEntry};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use request::{CacheMode, Request, RequestMode};
pub use response::Response;
