//! # flowgate
//!
//! Control plane for an Envoy-based API gateway fleet. API documents
//! (Swagger 2.0 and OpenAPI 3.x with gateway vendor extensions) are compiled
//! into listeners, routes, clusters and endpoints, partitioned by label, and
//! streamed to proxies over the xDS Aggregated Discovery Service.
//!
//! ## Architecture
//!
//! ```text
//! zip bundle → normalize → compile → aggregate → SnapshotCache → ADS → Envoy
//!     ↑                                              (per label)
//!  Admin API
//! ```
//!
//! ## Core Components
//!
//! - [`openapi`]: document normalization into [`domain::ApiDescriptor`]
//! - [`compiler`]: resource compilation and per-label aggregation
//! - [`xds`]: snapshot cache and the ADS State-of-the-World server
//! - [`services`]: bundle ingestion and the deployment registry
//! - [`api`]: the authenticated admin HTTP surface
//! - [`startup`]: process wiring and graceful shutdown

pub mod api;
pub mod compiler;
pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod openapi;
pub mod services;
pub mod startup;
pub mod xds;

pub use config::AppConfig;
pub use errors::{Error, Result};
pub use startup::ControlPlane;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
