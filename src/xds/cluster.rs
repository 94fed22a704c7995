//! Cluster and endpoint-assignment conversion to Envoy v3 protobufs.

use envoy_types::pb::envoy::config::cluster::v3::cluster::{
    ClusterDiscoveryType, DiscoveryType, EdsClusterConfig, LbPolicy,
};
use envoy_types::pb::envoy::config::cluster::v3::Cluster;
use envoy_types::pb::envoy::config::core::v3::transport_socket::ConfigType as TransportSocketConfigType;
use envoy_types::pb::envoy::config::core::v3::{
    address, config_source::ConfigSourceSpecifier, socket_address::{self, Protocol}, Address,
    AggregatedConfigSource, ApiVersion, ConfigSource, SocketAddress, TransportSocket,
};
use envoy_types::pb::envoy::config::endpoint::v3::{
    lb_endpoint, ClusterLoadAssignment, Endpoint, LbEndpoint, LocalityLbEndpoints,
};
use envoy_types::pb::envoy::extensions::transport_sockets::tls::v3::{
    CommonTlsContext, UpstreamTlsContext,
};
use envoy_types::pb::google::protobuf::Any;
use prost::Message;
use tracing::warn;

use crate::domain::{self, ClusterEndpoint, EndpointAssignment};

use super::resources::{proto_duration, TLS_TRANSPORT_SOCKET, UPSTREAM_TLS_TYPE_URL};

/// Convert a compiled cluster.
///
/// Pools made only of IP literals are resolved through EDS over the same ADS
/// stream. Hostname pools carry their assignment inline and let the proxy
/// resolve DNS: `LOGICAL_DNS` for a single host, `STRICT_DNS` otherwise.
pub fn cluster_to_envoy(cluster: &domain::Cluster) -> Cluster {
    let mut envoy = Cluster {
        name: cluster.name.clone(),
        connect_timeout: Some(proto_duration(cluster.connect_timeout)),
        lb_policy: LbPolicy::RoundRobin as i32,
        ..Default::default()
    };

    if cluster.uses_endpoint_discovery() {
        envoy.cluster_discovery_type = Some(ClusterDiscoveryType::Type(DiscoveryType::Eds as i32));
        envoy.eds_cluster_config = Some(EdsClusterConfig {
            eds_config: Some(ads_config_source()),
            service_name: String::new(),
        });
    } else {
        let discovery_type = if cluster.endpoints.len() <= 1 {
            DiscoveryType::LogicalDns
        } else {
            DiscoveryType::StrictDns
        };
        envoy.cluster_discovery_type = Some(ClusterDiscoveryType::Type(discovery_type as i32));
        envoy.load_assignment = Some(assignment_to_envoy(&cluster.assignment()));
    }

    if cluster.tls {
        let mut tls_context = UpstreamTlsContext {
            common_tls_context: Some(CommonTlsContext::default()),
            ..Default::default()
        };

        match &cluster.sni {
            Some(server_name) => tls_context.sni = server_name.clone(),
            None => warn!(
                cluster = %cluster.name,
                "TLS enabled without a hostname for SNI; upstream certificate verification may fail"
            ),
        }

        envoy.transport_socket = Some(TransportSocket {
            name: TLS_TRANSPORT_SOCKET.to_string(),
            config_type: Some(TransportSocketConfigType::TypedConfig(Any {
                type_url: UPSTREAM_TLS_TYPE_URL.to_string(),
                value: tls_context.encode_to_vec(),
            })),
        });
    }

    envoy
}

pub fn assignment_to_envoy(assignment: &EndpointAssignment) -> ClusterLoadAssignment {
    ClusterLoadAssignment {
        cluster_name: assignment.cluster_name.clone(),
        endpoints: vec![LocalityLbEndpoints {
            lb_endpoints: assignment.endpoints.iter().map(to_lb_endpoint).collect(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub(crate) fn ads_config_source() -> ConfigSource {
    ConfigSource {
        config_source_specifier: Some(ConfigSourceSpecifier::Ads(
            AggregatedConfigSource::default(),
        )),
        resource_api_version: ApiVersion::V3 as i32,
        ..Default::default()
    }
}

fn to_lb_endpoint(endpoint: &ClusterEndpoint) -> LbEndpoint {
    LbEndpoint {
        host_identifier: Some(lb_endpoint::HostIdentifier::Endpoint(Endpoint {
            address: Some(Address {
                address: Some(address::Address::SocketAddress(SocketAddress {
                    address: endpoint.host.clone(),
                    port_specifier: Some(socket_address::PortSpecifier::PortValue(
                        u32::from(endpoint.port),
                    )),
                    protocol: Protocol::Tcp as i32,
                    ..Default::default()
                })),
            }),
            ..Default::default()
        })),
        ..Default::default()
    }
}
