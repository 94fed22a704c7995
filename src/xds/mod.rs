//! # Snapshot Cache & Distribution Server
//!
//! Envoy xDS v3 distribution over the Aggregated Discovery Service,
//! State-of-the-World variant.
//!
//! - [`cache`]: per-label immutable snapshots with monotonic versions
//! - [`encoder`]: protobuf encoding behind the [`ResourceEncoder`] trait
//! - [`session`]: per-stream ACK/NACK bookkeeping and push ordering
//! - [`services`]: the tonic service and its stream driver
//! - [`server`]: gRPC server startup with graceful shutdown

pub mod cache;
pub mod cluster;
pub mod encoder;
pub mod listener;
pub mod resources;
pub mod route;
pub mod server;
pub mod services;
pub mod session;

pub use cache::{PublishSet, Snapshot, SnapshotCache};
pub use encoder::{EnvoyV3Encoder, ResourceEncoder};
pub use resources::{
    BuiltResource, ResourceType, CLUSTER_TYPE_URL, ENDPOINT_TYPE_URL, LISTENER_TYPE_URL,
    ROUTE_TYPE_URL,
};
pub use server::{serve_xds, start_xds_server};
pub use services::SnapshotDiscoveryService;
pub use session::{label_from_node, RequestOutcome, Session};
