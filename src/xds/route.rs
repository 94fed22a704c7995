//! Route table conversion to Envoy v3 protobufs.

use envoy_types::pb::envoy::config::core::v3::TypedExtensionConfig;
use envoy_types::pb::envoy::config::route::v3::{
    route::Action, route_action::{ClusterSpecifier, HostRewriteSpecifier},
    route_match::PathSpecifier, HeaderMatcher, Route, RouteAction, RouteConfiguration, RouteMatch,
    VirtualHost,
};
use envoy_types::pb::envoy::extensions::path::r#match::uri_template::v3::UriTemplateMatchConfig;
use envoy_types::pb::envoy::extensions::path::rewrite::uri_template::v3::UriTemplateRewriteConfig;
use envoy_types::pb::envoy::r#type::matcher::v3::{string_matcher::MatchPattern, StringMatcher};
use envoy_types::pb::envoy::config::route::v3::header_matcher::HeaderMatchSpecifier;
use envoy_types::pb::google::protobuf::Any;
use prost::Message;

use crate::domain::{self, CompiledRoute};

use super::resources::{proto_duration, URI_TEMPLATE_MATCH_TYPE_URL, URI_TEMPLATE_REWRITE_TYPE_URL};

pub fn route_config_to_envoy(route_config: &domain::RouteConfiguration) -> RouteConfiguration {
    let virtual_host = &route_config.virtual_host;

    RouteConfiguration {
        name: route_config.name.clone(),
        virtual_hosts: vec![VirtualHost {
            name: virtual_host.name.clone(),
            domains: virtual_host.domains.clone(),
            routes: virtual_host.routes.iter().map(route_to_envoy).collect(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn route_to_envoy(route: &CompiledRoute) -> Route {
    let route_match = RouteMatch {
        path_specifier: Some(PathSpecifier::PathMatchPolicy(TypedExtensionConfig {
            name: "envoy.path.match.uri_template".to_string(),
            typed_config: Some(Any {
                type_url: URI_TEMPLATE_MATCH_TYPE_URL.to_string(),
                value: UriTemplateMatchConfig { path_template: route.path_template.clone() }
                    .encode_to_vec(),
            }),
        })),
        headers: vec![HeaderMatcher {
            name: ":method".to_string(),
            header_match_specifier: Some(HeaderMatchSpecifier::StringMatch(StringMatcher {
                match_pattern: Some(MatchPattern::Exact(route.method.as_str().to_string())),
                ignore_case: false,
            })),
            ..Default::default()
        }],
        ..Default::default()
    };

    #[allow(deprecated)]
    let mut route_action = RouteAction {
        cluster_specifier: Some(ClusterSpecifier::Cluster(route.cluster.clone())),
        timeout: Some(proto_duration(route.timeout)),
        ..Default::default()
    };

    if let Some(host) = &route.host_rewrite {
        route_action.host_rewrite_specifier = Some(HostRewriteSpecifier::HostRewriteLiteral(host.clone()));
    }

    // prefix_rewrite cannot be combined with a path match policy
    if let Some(template) = &route.rewrite_template {
        route_action.path_rewrite_policy = Some(TypedExtensionConfig {
            name: "envoy.path.rewrite.uri_template".to_string(),
            typed_config: Some(Any {
                type_url: URI_TEMPLATE_REWRITE_TYPE_URL.to_string(),
                value: UriTemplateRewriteConfig { path_template_rewrite: template.clone() }
                    .encode_to_vec(),
            }),
        });
    }

    Route {
        name: route.name.clone(),
        r#match: Some(route_match),
        action: Some(Action::Route(route_action)),
        ..Default::default()
    }
}
