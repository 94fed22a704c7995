use std::fs;
use std::sync::Arc;

use rustls::pki_types::{pem::PemObject, CertificateDer, PrivateKeyDer};
use tonic::transport::{Certificate, Identity, ServerTlsConfig};

use crate::{config::TlsFiles, Error, Result};

/// Build the rustls server configuration for the admin API listener.
pub fn rustls_server_config(tls: &TlsFiles) -> Result<Arc<rustls::ServerConfig>> {
    let cert_bytes = read_pem(&tls.cert_path, "certificate")?;
    let key_bytes = read_pem(&tls.key_path, "private key")?;

    let cert_chain: Vec<CertificateDer<'static>> = CertificateDer::pem_slice_iter(&cert_bytes)
        .collect::<std::result::Result<_, _>>()
        .map_err(|err| {
            Error::config(format!(
                "invalid certificate PEM '{}': {}",
                tls.cert_path.display(),
                err
            ))
        })?;

    if cert_chain.is_empty() {
        return Err(Error::config(format!(
            "certificate file '{}' contains no certificates",
            tls.cert_path.display()
        )));
    }

    let private_key = PrivateKeyDer::from_pem_slice(&key_bytes).map_err(|err| {
        Error::config(format!("invalid private key '{}': {}", tls.key_path.display(), err))
    })?;

    let provider = rustls::crypto::ring::default_provider();
    let server_config = rustls::ServerConfig::builder_with_provider(provider.into())
        .with_safe_default_protocol_versions()
        .map_err(|err| Error::config(format!("Invalid TLS protocol configuration: {err}")))?
        .with_no_client_auth()
        .with_single_cert(cert_chain, private_key)
        .map_err(|err| Error::config(format!("Failed to load TLS certificate: {err}")))?;

    Ok(Arc::new(server_config))
}

/// Build the tonic TLS configuration for the xDS server, with optional client verification.
pub fn xds_server_tls_config(tls: &TlsFiles) -> Result<ServerTlsConfig> {
    let cert = read_pem(&tls.cert_path, "certificate")?;
    let key = read_pem(&tls.key_path, "private key")?;

    let mut config = ServerTlsConfig::new().identity(Identity::from_pem(cert, key));

    if let Some(ca_path) = &tls.client_ca_path {
        let ca = read_pem(ca_path, "client CA")?;
        config = config.client_ca_root(Certificate::from_pem(ca));
    }

    Ok(config)
}

fn read_pem(path: &std::path::Path, what: &str) -> Result<Vec<u8>> {
    fs::read(path)
        .map_err(|err| Error::config(format!("failed to read {} '{}': {}", what, path.display(), err)))
}
