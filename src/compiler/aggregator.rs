//! # Resource Aggregator
//!
//! Folds the routes of every API in a label into the single listener and
//! route table the proxy fleet serves. Aggregation always starts from the
//! full route set, so a republish replaces the previous table instead of
//! merging into it.

use crate::config::RouterConfig;
use crate::domain::{
    CompiledRoute, Listener, ListenerTls, RouteConfiguration, DEFAULT_ROUTE_CONFIG_NAME,
};

/// Name of the single proxy listener
pub const DEFAULT_LISTENER_NAME: &str = "default";

/// Address and TLS material for the proxy listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSettings {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub tls: Option<ListenerTls>,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self::from(&RouterConfig::default())
    }
}

impl From<&RouterConfig> for ListenerSettings {
    fn from(config: &RouterConfig) -> Self {
        Self {
            name: DEFAULT_LISTENER_NAME.to_string(),
            address: config.listener_address.clone(),
            port: config.listener_port,
            tls: config.listener_tls.as_ref().map(|tls| ListenerTls {
                cert_path: tls.cert_path.display().to_string(),
                key_path: tls.key_path.display().to_string(),
            }),
        }
    }
}

/// Build the listener and its route table from a label's routes
pub fn aggregate(
    routes: Vec<CompiledRoute>,
    settings: &ListenerSettings,
) -> (Listener, RouteConfiguration) {
    let listener = Listener {
        name: settings.name.clone(),
        address: settings.address.clone(),
        port: settings.port,
        tls: settings.tls.clone(),
        route_config_name: DEFAULT_ROUTE_CONFIG_NAME.to_string(),
    };

    (listener, RouteConfiguration::new(routes))
}
