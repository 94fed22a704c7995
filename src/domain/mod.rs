//! Domain layer
//!
//! Pure value types shared by the normalizer, compiler, aggregator and the
//! snapshot cache. Nothing here depends on the discovery wire format or on
//! the HTTP framework.
//!
//! ## Module Organization
//!
//! - `label`: validated partition labels
//! - `api`: the canonical API descriptor produced by the normalizer
//! - `resources`: routes, clusters, endpoints, listeners and route tables

pub mod api;
pub mod label;
pub mod resources;

pub use api::{ApiDescriptor, ApiId, ApiResource, Endpoint, EndpointKind, HttpMethod};
pub use label::{Label, Labels, DEFAULT_LABEL};
pub use resources::{
    Cluster, ClusterEndpoint, CompiledRoute, EndpointAssignment, Listener, ListenerTls,
    RouteConfiguration, VirtualHost, DEFAULT_ROUTE_CONFIG_NAME, DEFAULT_VIRTUAL_HOST_NAME,
};
