//! # Resource Compiler
//!
//! Turns an [`ApiDescriptor`] into routes, clusters and endpoint assignments.
//!
//! Each resource resolves its effective endpoint set (operation override,
//! else the API default) and gets one route targeting the production pool,
//! or the sandbox pool when no production target exists. Duplicate
//! `(path, verb)` pairs resolve last-write-wins in declaration order.
//! Path-matching priority between routes is left to the data plane.

pub mod aggregator;
pub mod naming;

pub use aggregator::{aggregate, ListenerSettings};

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::config::RouterConfig;
use crate::domain::{
    ApiDescriptor, ApiResource, Cluster, ClusterEndpoint, CompiledRoute, Endpoint,
    EndpointAssignment, EndpointKind, HttpMethod,
};
use crate::{Error, Result};

/// Process-wide compilation defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    pub default_route_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self { default_route_timeout: Duration::from_secs(60), connect_timeout: Duration::from_secs(5) }
    }
}

impl From<&RouterConfig> for CompilerOptions {
    fn from(config: &RouterConfig) -> Self {
        Self {
            default_route_timeout: config.default_route_timeout(),
            connect_timeout: config.connect_timeout(),
        }
    }
}

/// Resources generated for one API
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledApi {
    pub routes: Vec<CompiledRoute>,
    pub clusters: Vec<Cluster>,
    pub endpoints: Vec<EndpointAssignment>,
}

impl CompiledApi {
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty() && self.clusters.is_empty()
    }
}

/// Compile one descriptor
pub fn compile(descriptor: &ApiDescriptor, options: &CompilerOptions) -> Result<CompiledApi> {
    let api_id = descriptor.id().to_string();
    let mut compiled = CompiledApi::default();
    let mut cluster_index: HashMap<String, usize> = HashMap::new();

    for (template, resource) in effective_resources(descriptor) {
        let production = pool_for(descriptor, resource, EndpointKind::Production, &template, options)?;
        let sandbox = pool_for(descriptor, resource, EndpointKind::Sandbox, &template, options)?;

        let (target, target_endpoints) = match (&production, &sandbox) {
            (Some((cluster, endpoints)), _) | (None, Some((cluster, endpoints))) => {
                (cluster.name.clone(), *endpoints)
            }
            (None, None) => {
                return Err(Error::compilation(
                    api_id,
                    format!(
                        "resource {} {} has no backend endpoints and yields no route",
                        resource.method, resource.path
                    ),
                ))
            }
        };

        let route = build_route(descriptor, resource, &template, target, target_endpoints, options);
        debug!(api = %api_id, route = %route.name, cluster = %route.cluster, "Compiled route");
        compiled.routes.push(route);

        for (cluster, _) in [production, sandbox].into_iter().flatten() {
            match cluster_index.get(&cluster.name) {
                Some(&idx) => compiled.clusters[idx] = cluster,
                None => {
                    cluster_index.insert(cluster.name.clone(), compiled.clusters.len());
                    compiled.clusters.push(cluster);
                }
            }
        }
    }

    compiled.endpoints = compiled.clusters.iter().map(Cluster::assignment).collect();

    Ok(compiled)
}

/// Resources keyed by full path template and verb; a later declaration
/// replaces an earlier one in the earlier one's position.
fn effective_resources(descriptor: &ApiDescriptor) -> Vec<(String, &ApiResource)> {
    let mut ordered: Vec<(String, &ApiResource)> = Vec::new();
    let mut index: HashMap<(String, HttpMethod), usize> = HashMap::new();

    for resource in &descriptor.resources {
        let template = naming::normalize_template(&naming::join_paths(
            &descriptor.base_path,
            naming::relative_to_base(&descriptor.base_path, &resource.path),
        ));

        match index.get(&(template.clone(), resource.method)) {
            Some(&idx) => ordered[idx] = (template, resource),
            None => {
                index.insert((template.clone(), resource.method), ordered.len());
                ordered.push((template, resource));
            }
        }
    }

    ordered
}

fn pool_for<'a>(
    descriptor: &'a ApiDescriptor,
    resource: &'a ApiResource,
    kind: EndpointKind,
    template: &str,
    options: &CompilerOptions,
) -> Result<Option<(Cluster, &'a [Endpoint])>> {
    let (overrides, defaults) = match kind {
        EndpointKind::Production => {
            (&resource.production_endpoints, &descriptor.production_endpoints)
        }
        EndpointKind::Sandbox => (&resource.sandbox_endpoints, &descriptor.sandbox_endpoints),
    };

    let (name, endpoints) = if !overrides.is_empty() {
        (
            naming::override_cluster_name(
                &descriptor.name,
                &descriptor.version,
                kind,
                resource.method,
                template,
            ),
            overrides.as_slice(),
        )
    } else if !defaults.is_empty() {
        (naming::cluster_name(&descriptor.name, &descriptor.version, kind), defaults.as_slice())
    } else {
        return Ok(None);
    };

    Ok(Some((build_cluster(name, endpoints, options)?, endpoints)))
}

fn build_cluster(name: String, endpoints: &[Endpoint], options: &CompilerOptions) -> Result<Cluster> {
    let tls = endpoints.first().map(|endpoint| endpoint.tls).unwrap_or(false);
    if endpoints.iter().any(|endpoint| endpoint.tls != tls) {
        return Err(Error::input_format(format!(
            "endpoints of cluster '{}' mix plain and TLS backends",
            name
        )));
    }

    let mut addresses: Vec<ClusterEndpoint> = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        let address = ClusterEndpoint::new(endpoint.host.clone(), endpoint.port);
        if !addresses.contains(&address) {
            addresses.push(address);
        }
    }

    let sni = if tls {
        addresses.iter().find(|address| !address.is_ip()).map(|address| address.host.clone())
    } else {
        None
    };

    Ok(Cluster { name, endpoints: addresses, tls, sni, connect_timeout: options.connect_timeout })
}

fn build_route(
    descriptor: &ApiDescriptor,
    resource: &ApiResource,
    template: &str,
    cluster: String,
    endpoints: &[Endpoint],
    options: &CompilerOptions,
) -> CompiledRoute {
    let primary = endpoints.first();

    let relative = naming::relative_to_base(&descriptor.base_path, &resource.path);
    let upstream = naming::normalize_template(&naming::join_paths(
        primary.map(|endpoint| endpoint.path.as_str()).unwrap_or_default(),
        relative,
    ));

    CompiledRoute {
        name: naming::route_name(&descriptor.name, &descriptor.version, resource.method, template),
        path_template: template.to_string(),
        method: resource.method,
        cluster,
        timeout: descriptor.request_timeout.unwrap_or(options.default_route_timeout),
        host_rewrite: primary.map(|endpoint| endpoint.host.clone()),
        rewrite_template: (upstream != template).then_some(upstream),
    }
}
