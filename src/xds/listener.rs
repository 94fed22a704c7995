//! Listener conversion to Envoy v3 protobufs.
//!
//! The listener runs one HTTP connection manager that fetches route table
//! `default` over ADS, routes with the router filter and renders upstream
//! failures as JSON through its local reply config.

use envoy_types::pb::envoy::config::accesslog::v3::{
    access_log_filter::FilterSpecifier, AccessLogFilter, ResponseFlagFilter,
};
use envoy_types::pb::envoy::config::core::v3::{
    address::Address as AddressType, data_source::Specifier, socket_address,
    substitution_format_string::Format, transport_socket::ConfigType as TransportSocketConfigType,
    Address, DataSource, SocketAddress, SubstitutionFormatString, TransportSocket,
};
use envoy_types::pb::envoy::config::listener::v3::{filter, Filter, FilterChain, Listener};
use envoy_types::pb::envoy::extensions::filters::http::router::v3::Router;
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::{
    http_connection_manager::{CodecType, RouteSpecifier},
    http_filter, HttpConnectionManager, HttpFilter, LocalReplyConfig, Rds, ResponseMapper,
};
use envoy_types::pb::envoy::extensions::transport_sockets::tls::v3::{
    CommonTlsContext, DownstreamTlsContext, TlsCertificate,
};
use envoy_types::pb::google::protobuf::{Any, UInt32Value};
use prost::Message;

use crate::domain::{self, ListenerTls};
use crate::errors::UpstreamFailure;
use crate::{Error, Result};

use super::cluster::ads_config_source;
use super::resources::{DOWNSTREAM_TLS_TYPE_URL, HCM_TYPE_URL, ROUTER_TYPE_URL, TLS_TRANSPORT_SOCKET};

pub fn listener_to_envoy(listener: &domain::Listener) -> Result<Listener> {
    let hcm = HttpConnectionManager {
        stat_prefix: "ingress_http".to_string(),
        codec_type: CodecType::Auto as i32,
        route_specifier: Some(RouteSpecifier::Rds(Rds {
            route_config_name: listener.route_config_name.clone(),
            config_source: Some(ads_config_source()),
        })),
        http_filters: vec![router_filter()],
        local_reply_config: Some(local_reply_config()?),
        ..Default::default()
    };

    let filter_chain = FilterChain {
        filters: vec![Filter {
            name: "envoy.filters.network.http_connection_manager".to_string(),
            config_type: Some(filter::ConfigType::TypedConfig(Any {
                type_url: HCM_TYPE_URL.to_string(),
                value: hcm.encode_to_vec(),
            })),
        }],
        transport_socket: listener.tls.as_ref().map(downstream_transport_socket),
        ..Default::default()
    };

    Ok(Listener {
        name: listener.name.clone(),
        address: Some(Address {
            address: Some(AddressType::SocketAddress(SocketAddress {
                address: listener.address.clone(),
                port_specifier: Some(socket_address::PortSpecifier::PortValue(u32::from(
                    listener.port,
                ))),
                ..Default::default()
            })),
        }),
        filter_chains: vec![filter_chain],
        ..Default::default()
    })
}

fn router_filter() -> HttpFilter {
    HttpFilter {
        name: "envoy.filters.http.router".to_string(),
        config_type: Some(http_filter::ConfigType::TypedConfig(Any {
            type_url: ROUTER_TYPE_URL.to_string(),
            value: Router::default().encode_to_vec(),
        })),
        ..Default::default()
    }
}

/// One mapper per catalogued response flag, rewriting the status and body
fn local_reply_config() -> Result<LocalReplyConfig> {
    let mappers = UpstreamFailure::ALL
        .iter()
        .map(|failure| {
            let body = serde_json::to_string(&failure.body()).map_err(|err| {
                Error::internal(format!("failed to render local reply body: {}", err))
            })?;

            Ok(ResponseMapper {
                filter: Some(AccessLogFilter {
                    filter_specifier: Some(FilterSpecifier::ResponseFlagFilter(
                        ResponseFlagFilter { flags: vec![failure.response_flag().to_string()] },
                    )),
                }),
                status_code: Some(UInt32Value { value: u32::from(failure.status()) }),
                body_format_override: Some(SubstitutionFormatString {
                    format: Some(Format::TextFormatSource(inline_data_source(
                        body.replace('%', "%%"),
                    ))),
                    content_type: "application/json".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LocalReplyConfig { mappers, ..Default::default() })
}

fn downstream_transport_socket(tls: &ListenerTls) -> TransportSocket {
    let common = CommonTlsContext {
        tls_certificates: vec![TlsCertificate {
            certificate_chain: Some(data_source_from_path(&tls.cert_path)),
            private_key: Some(data_source_from_path(&tls.key_path)),
            ..Default::default()
        }],
        ..Default::default()
    };

    let downstream = DownstreamTlsContext { common_tls_context: Some(common), ..Default::default() };

    TransportSocket {
        name: TLS_TRANSPORT_SOCKET.to_string(),
        config_type: Some(TransportSocketConfigType::TypedConfig(Any {
            type_url: DOWNSTREAM_TLS_TYPE_URL.to_string(),
            value: downstream.encode_to_vec(),
        })),
    }
}

fn data_source_from_path(path: &str) -> DataSource {
    DataSource { specifier: Some(Specifier::Filename(path.to_string())), ..Default::default() }
}

fn inline_data_source(contents: String) -> DataSource {
    DataSource { specifier: Some(Specifier::InlineString(contents)), ..Default::default() }
}
