//! Business logic services
//!
//! Bundle ingestion and API deployment, separated from HTTP concerns.

pub mod bundle;
pub mod deployer;

pub use bundle::{extract_documents, BundleEntry};
pub use deployer::{
    ApiDeployer, ApiSummary, DeployOptions, DeployReport, DeployedApi, SkippedApi,
};
