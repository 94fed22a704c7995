//! # Configuration Settings
//!
//! Defines the configuration structure for the flowgate control plane.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AppConfig {
    /// xDS server configuration
    #[validate(nested)]
    pub xds: XdsConfig,

    /// Administrative API configuration
    #[validate(nested)]
    pub admin: AdminConfig,

    /// Data-plane listener and route defaults
    #[validate(nested)]
    pub router: RouterConfig,

    /// Logging configuration document location
    #[validate(nested)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;

        self.validate_custom()?;

        Ok(())
    }

    /// Custom validation logic that goes beyond what the validator crate can do
    fn validate_custom(&self) -> Result<()> {
        if self.xds.port == self.admin.port && self.xds.bind_address == self.admin.bind_address {
            return Err(Error::bootstrap("xDS and admin servers cannot share the same address"));
        }

        if self.admin.username.trim().is_empty() || self.admin.password.is_empty() {
            return Err(Error::bootstrap("admin credentials must be configured"));
        }

        Ok(())
    }
}

/// TLS certificate and key locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// CA bundle used to require and verify client certificates
    #[serde(default)]
    pub client_ca_path: Option<PathBuf>,
}

/// xDS server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct XdsConfig {
    #[validate(length(min = 1, message = "xDS bind address cannot be empty"))]
    pub bind_address: String,

    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// How long a session waits for an ACK or NACK before moving on
    #[validate(range(
        min = 1,
        max = 600,
        message = "ACK timeout must be between 1 and 600 seconds"
    ))]
    pub ack_timeout_seconds: u64,

    pub tls: Option<TlsFiles>,
}

impl Default for XdsConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 18000,
            ack_timeout_seconds: 30,
            tls: None,
        }
    }
}

impl XdsConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_seconds)
    }
}

/// Administrative API configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AdminConfig {
    #[validate(length(min = 1, message = "Admin bind address cannot be empty"))]
    pub bind_address: String,

    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    pub username: String,

    pub password: String,

    /// Maximum accepted bundle size in bytes
    #[validate(range(min = 1024, message = "Max bundle size must be at least 1KB"))]
    pub max_bundle_bytes: usize,

    /// Maximum decompressed size of the documents in one bundle
    #[validate(range(min = 1024, message = "Max extracted size must be at least 1KB"))]
    pub max_extracted_bytes: usize,

    pub tls: Option<TlsFiles>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 9843,
            username: String::new(),
            password: String::new(),
            max_bundle_bytes: 16 * 1024 * 1024, // 16MB
            max_extracted_bytes: 64 * 1024 * 1024,
            tls: None,
        }
    }
}

impl AdminConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Data-plane listener and route defaults
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RouterConfig {
    #[validate(length(min = 1, message = "Listener address cannot be empty"))]
    pub listener_address: String,

    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub listener_port: u16,

    /// Downstream TLS material for the proxy listener, as paths on the proxy host
    pub listener_tls: Option<TlsFiles>,

    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,

    #[validate(range(
        min = 1,
        max = 3600,
        message = "Route timeout must be between 1 and 3600 seconds"
    ))]
    pub default_route_timeout_seconds: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            listener_address: "0.0.0.0".to_string(),
            listener_port: 9090,
            listener_tls: None,
            connect_timeout_seconds: 5,
            default_route_timeout_seconds: 60,
        }
    }
}

impl RouterConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn default_route_timeout(&self) -> Duration {
        Duration::from_secs(self.default_route_timeout_seconds)
    }
}

/// Location of the hot-reloaded logging document
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    pub config_path: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { config_path: PathBuf::from("config/log_config.toml") }
    }
}
