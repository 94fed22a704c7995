//! Core resource values produced by compilation and aggregation.
//!
//! These types carry no wire-format dependency; the xDS encoder maps them to
//! Envoy protobufs when a snapshot is served.

use serde::Serialize;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::time::Duration;

use crate::domain::HttpMethod;

/// Name of the single route table every listener references
pub const DEFAULT_ROUTE_CONFIG_NAME: &str = "default";

/// Name of the single virtual host inside the route table
pub const DEFAULT_VIRTUAL_HOST_NAME: &str = "default";

/// A route synthesized from one API resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledRoute {
    pub name: String,
    /// Full URI template matched against the request path
    pub path_template: String,
    pub method: HttpMethod,
    pub cluster: String,
    pub timeout: Duration,
    pub host_rewrite: Option<String>,
    /// URI template the upstream path is rewritten to, when it differs from the match
    pub rewrite_template: Option<String>,
}

/// Resolved backend network address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ClusterEndpoint {
    pub host: String,
    pub port: u16,
}

impl ClusterEndpoint {
    pub fn new<H: Into<String>>(host: H, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    pub fn is_ip(&self) -> bool {
        self.host.parse::<IpAddr>().is_ok()
    }
}

/// Named upstream pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub name: String,
    pub endpoints: Vec<ClusterEndpoint>,
    pub tls: bool,
    pub sni: Option<String>,
    pub connect_timeout: Duration,
}

impl Cluster {
    /// Endpoints are resolved by the proxy only when every host is an IP literal
    pub fn uses_endpoint_discovery(&self) -> bool {
        !self.endpoints.is_empty() && self.endpoints.iter().all(ClusterEndpoint::is_ip)
    }

    pub fn assignment(&self) -> EndpointAssignment {
        EndpointAssignment { cluster_name: self.name.clone(), endpoints: self.endpoints.clone() }
    }
}

/// Endpoint set served for one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointAssignment {
    pub cluster_name: String,
    pub endpoints: Vec<ClusterEndpoint>,
}

/// Downstream TLS material, as paths readable by the proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerTls {
    pub cert_path: String,
    pub key_path: String,
}

/// Proxy entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listener {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub tls: Option<ListenerTls>,
    pub route_config_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualHost {
    pub name: String,
    pub domains: Vec<String>,
    pub routes: Vec<CompiledRoute>,
}

/// Route table holding exactly one virtual host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteConfiguration {
    pub name: String,
    pub virtual_host: VirtualHost,
}

impl RouteConfiguration {
    pub fn new(routes: Vec<CompiledRoute>) -> Self {
        Self {
            name: DEFAULT_ROUTE_CONFIG_NAME.to_string(),
            virtual_host: VirtualHost {
                name: DEFAULT_VIRTUAL_HOST_NAME.to_string(),
                domains: vec!["*".to_string()],
                routes,
            },
        }
    }

    /// Replace the full route set. Nothing of the previous set survives.
    pub fn replace(&mut self, new_routes: Vec<CompiledRoute>) {
        self.virtual_host.routes = new_routes;
    }

    pub fn routes(&self) -> &[CompiledRoute] {
        &self.virtual_host.routes
    }

    pub fn referenced_clusters(&self) -> BTreeSet<&str> {
        self.virtual_host.routes.iter().map(|route| route.cluster.as_str()).collect()
    }
}
