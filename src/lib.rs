//! # url-safety-checker
//!
//! A threat-list synchronization and multi-tier URL lookup service,
//! mirroring a subset of Google's Safe Browsing v4 lists locally and
//! serving batched lookups through a cascaded cache → prefix-index →
//! full-hash confirmation pipeline.
//!
//! - `config`: environment-based startup configuration.
//! - `error`: the crate-wide `AppError` and its HTTP mapping.
//! - `store`: the durable Prefix Store (PostgreSQL).
//! - `cache`: the ephemeral Cache (Redis).
//! - `safebrowsing`: the Safe Browsing v4 HTTP client.
//! - `updater`: the background threat-list synchronization loop.
//! - `lookup`: the per-request lookup cascade.
//! - `blacklist`: the operator-supplied blacklist loader.
//! - `api`: the HTTP front door.

pub mod api;
pub mod blacklist;
pub mod cache;
pub mod config;
pub mod error;
pub mod lookup;
pub mod safebrowsing;
pub mod store;
pub mod updater;

/// Crate version, re-exported for diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name, re-exported for diagnostics.
pub const NAME: &str = env!("CARGO_PKG_NAME");
