//! # Admin API
//!
//! HTTP surface for deploying, listing and deleting API bundles. Every route
//! except `/health` requires the configured Basic credentials.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

pub use auth::{AdminCredentials, AdminUser};
pub use error::{ApiError, ErrorBody};
pub use routes::build_router;
pub use server::{serve_admin, start_admin_server};
