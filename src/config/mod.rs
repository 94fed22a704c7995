//! # Configuration Management
//!
//! The primary configuration document is TOML, read once at startup with the
//! `config` crate. Values may be overridden through `FLOWGATE__SECTION__KEY`
//! environment variables. A missing or malformed document is a bootstrap
//! failure.

pub mod settings;
pub mod tls;

pub use settings::{
    AdminConfig, AppConfig, LoggingConfig, RouterConfig, TlsFiles, XdsConfig,
};

use std::path::Path;

use crate::{Error, Result};

/// Environment variable naming the primary configuration file
pub const CONFIG_PATH_ENV: &str = "FLOWGATE_CONFIG";

/// Default location of the primary configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/flowgate.toml";

/// Load and validate the primary configuration document
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.is_file() {
        return Err(Error::bootstrap(format!(
            "configuration file '{}' does not exist",
            path.display()
        )));
    }

    let settings = config::Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Toml).required(true))
        .add_source(
            config::Environment::with_prefix("FLOWGATE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = settings.try_deserialize()?;
    app_config.validate()?;

    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r#"
            [xds]
            bind_address = "127.0.0.1"
            port = 18001
            ack_timeout_seconds = 10

            [admin]
            port = 9900
            username = "admin"
            password = "secret"

            [router]
            listener_port = 8443
            default_route_timeout_seconds = 15

            [router.listener_tls]
            cert_path = "/etc/envoy/cert.pem"
            key_path = "/etc/envoy/key.pem"

            [logging]
            config_path = "/etc/flowgate/log.toml"
            "#,
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.xds.bind_address(), "127.0.0.1:18001");
        assert_eq!(config.xds.ack_timeout_seconds, 10);
        assert_eq!(config.admin.port, 9900);
        assert_eq!(config.admin.username, "admin");
        assert_eq!(config.router.listener_port, 8443);
        assert_eq!(config.router.default_route_timeout_seconds, 15);
        assert_eq!(config.router.connect_timeout_seconds, 5);
        assert!(config.router.listener_tls.is_some());
        assert_eq!(config.logging.config_path, Path::new("/etc/flowgate/log.toml"));
    }

    #[test]
    fn test_missing_file_is_bootstrap_error() {
        let err = load_config(Path::new("/nonexistent/flowgate.toml")).unwrap_err();
        assert!(matches!(err, Error::Bootstrap { .. }));
    }

    #[test]
    fn test_malformed_file_is_bootstrap_error() {
        let file = write_config("[xds\nport = ");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, Error::Bootstrap { .. }));
    }

    #[test]
    fn test_invalid_values_are_bootstrap_error() {
        let file = write_config(
            r#"
            [admin]
            username = "admin"
            password = "secret"

            [router]
            connect_timeout_seconds = 0
            "#,
        );
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, Error::Bootstrap { .. }));
    }
}
