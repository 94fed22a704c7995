//! Resource types served over ADS and their type URLs.

use std::fmt;

use envoy_types::pb::google::protobuf::{Any, Duration};

pub const LISTENER_TYPE_URL: &str = "type.googleapis.com/envoy.config.listener.v3.Listener";
pub const ROUTE_TYPE_URL: &str = "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";
pub const CLUSTER_TYPE_URL: &str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";
pub const ENDPOINT_TYPE_URL: &str =
    "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";

pub(crate) const HCM_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.filters.network.http_connection_manager.v3.HttpConnectionManager";
pub(crate) const ROUTER_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.filters.http.router.v3.Router";
pub(crate) const UPSTREAM_TLS_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.UpstreamTlsContext";
pub(crate) const DOWNSTREAM_TLS_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.DownstreamTlsContext";
pub(crate) const URI_TEMPLATE_MATCH_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.path.match.uri_template.v3.UriTemplateMatchConfig";
pub(crate) const URI_TEMPLATE_REWRITE_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.path.rewrite.uri_template.v3.UriTemplateRewriteConfig";

pub(crate) const TLS_TRANSPORT_SOCKET: &str = "envoy.transport_sockets.tls";

/// The four resource kinds a proxy subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    Endpoint,
    Cluster,
    Route,
    Listener,
}

impl ResourceType {
    /// Push order for one snapshot: a resource is always sent after the
    /// resources it references.
    pub const DEPENDENCY_ORDER: [ResourceType; 4] =
        [ResourceType::Endpoint, ResourceType::Cluster, ResourceType::Route, ResourceType::Listener];

    pub fn type_url(self) -> &'static str {
        match self {
            ResourceType::Endpoint => ENDPOINT_TYPE_URL,
            ResourceType::Cluster => CLUSTER_TYPE_URL,
            ResourceType::Route => ROUTE_TYPE_URL,
            ResourceType::Listener => LISTENER_TYPE_URL,
        }
    }

    pub fn from_type_url(type_url: &str) -> Option<Self> {
        match type_url {
            ENDPOINT_TYPE_URL => Some(ResourceType::Endpoint),
            CLUSTER_TYPE_URL => Some(ResourceType::Cluster),
            ROUTE_TYPE_URL => Some(ResourceType::Route),
            LISTENER_TYPE_URL => Some(ResourceType::Listener),
            _ => None,
        }
    }

    /// Listener and Cluster subscriptions always receive every resource
    pub fn is_wildcard(self) -> bool {
        matches!(self, ResourceType::Listener | ResourceType::Cluster)
    }

    pub fn short_name(self) -> &'static str {
        match self {
            ResourceType::Endpoint => "EDS",
            ResourceType::Cluster => "CDS",
            ResourceType::Route => "RDS",
            ResourceType::Listener => "LDS",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Wrapper for a built Envoy resource along with its name.
#[derive(Clone, Debug)]
pub struct BuiltResource {
    pub name: String,
    pub resource: Any,
}

impl BuiltResource {
    pub fn new<M: prost::Message>(name: impl Into<String>, type_url: &str, message: &M) -> Self {
        Self {
            name: name.into(),
            resource: Any { type_url: type_url.to_string(), value: message.encode_to_vec() },
        }
    }

    pub fn into_any(self) -> Any {
        self.resource
    }
}

pub(crate) fn proto_duration(duration: std::time::Duration) -> Duration {
    Duration { seconds: duration.as_secs() as i64, nanos: duration.subsec_nanos() as i32 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_order_is_eds_cds_rds_lds() {
        let names: Vec<_> = ResourceType::DEPENDENCY_ORDER.iter().map(|t| t.short_name()).collect();
        assert_eq!(names, vec!["EDS", "CDS", "RDS", "LDS"]);
    }

    #[test]
    fn type_url_round_trips() {
        for resource_type in ResourceType::DEPENDENCY_ORDER {
            assert_eq!(ResourceType::from_type_url(resource_type.type_url()), Some(resource_type));
        }
        assert_eq!(ResourceType::from_type_url("type.googleapis.com/unknown"), None);
    }

    #[test]
    fn wildcard_types() {
        assert!(ResourceType::Listener.is_wildcard());
        assert!(ResourceType::Cluster.is_wildcard());
        assert!(!ResourceType::Route.is_wildcard());
        assert!(!ResourceType::Endpoint.is_wildcard());
    }
}
