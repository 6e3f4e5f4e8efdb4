//! Client code for offcache.
//!
//! This crate provides the network fetch pipeline and the offline cache
//! controller shared by the proxy server and the CLI.

pub mod controller;
pub mod fetch;

pub use controller::{
    ActivateReport, Controller, ControllerSettings, InstallReport, Intercept, RegisterReport, Registration, RequestKind,
    ResponseSource, Settled,
};

pub use fetch::{FetchClient, FetchConfig, Fetcher};
