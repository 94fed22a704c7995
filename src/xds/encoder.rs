//! Wire encoding of snapshots.
//!
//! Sessions only see [`ResourceEncoder`]; the protobuf mapping lives in
//! [`EnvoyV3Encoder`] and the conversion modules it delegates to.

use envoy_types::pb::google::protobuf::Any;
use tracing::debug;

use crate::Result;

use super::cache::Snapshot;
use super::cluster::{assignment_to_envoy, cluster_to_envoy};
use super::listener::listener_to_envoy;
use super::resources::{BuiltResource, ResourceType};
use super::route::route_config_to_envoy;

/// Encodes one resource type of a snapshot for the wire
pub trait ResourceEncoder: Send + Sync + 'static {
    fn type_url(&self, resource_type: ResourceType) -> &'static str {
        resource_type.type_url()
    }

    /// Encode the resources of `resource_type`, limited to `names` for
    /// non-wildcard types when names are given
    fn encode(&self, resource_type: ResourceType, snapshot: &Snapshot, names: &[String])
        -> Result<Vec<Any>>;
}

/// Envoy xDS v3 encoding
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvoyV3Encoder;

impl ResourceEncoder for EnvoyV3Encoder {
    fn encode(
        &self,
        resource_type: ResourceType,
        snapshot: &Snapshot,
        names: &[String],
    ) -> Result<Vec<Any>> {
        let wanted = |name: &str| {
            resource_type.is_wildcard() || names.is_empty() || names.iter().any(|n| n == name)
        };
        let type_url = self.type_url(resource_type);

        let built: Vec<BuiltResource> = match resource_type {
            ResourceType::Listener => snapshot
                .listeners
                .iter()
                .filter(|listener| wanted(&listener.name))
                .map(|listener| {
                    Ok(BuiltResource::new(&listener.name, type_url, &listener_to_envoy(listener)?))
                })
                .collect::<Result<_>>()?,
            ResourceType::Route => snapshot
                .route_configurations
                .iter()
                .filter(|config| wanted(&config.name))
                .map(|config| BuiltResource::new(&config.name, type_url, &route_config_to_envoy(config)))
                .collect(),
            ResourceType::Cluster => snapshot
                .clusters
                .iter()
                .filter(|cluster| wanted(&cluster.name))
                .map(|cluster| BuiltResource::new(&cluster.name, type_url, &cluster_to_envoy(cluster)))
                .collect(),
            ResourceType::Endpoint => snapshot
                .endpoints
                .iter()
                .filter(|assignment| wanted(&assignment.cluster_name))
                .map(|assignment| {
                    BuiltResource::new(
                        &assignment.cluster_name,
                        type_url,
                        &assignment_to_envoy(assignment),
                    )
                })
                .collect(),
        };

        debug!(
            label = %snapshot.label,
            version = snapshot.version,
            resource_type = %resource_type,
            resources = ?built.iter().map(|resource| resource.name.as_str()).collect::<Vec<_>>(),
            "Encoded resources"
        );

        Ok(built.into_iter().map(BuiltResource::into_any).collect())
    }
}
