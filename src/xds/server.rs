//! xDS gRPC server startup.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use envoy_types::pb::envoy::service::discovery::v3::aggregated_discovery_service_server::AggregatedDiscoveryServiceServer;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{info, warn};

use crate::config::{tls::xds_server_tls_config, XdsConfig};
use crate::{Error, Result};

use super::cache::SnapshotCache;
use super::encoder::ResourceEncoder;
use super::services::SnapshotDiscoveryService;

/// How long open streams may take to close after shutdown is requested
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Bind the configured address and serve ADS until `shutdown` is cancelled
pub async fn start_xds_server(
    config: &XdsConfig,
    cache: Arc<SnapshotCache>,
    encoder: Arc<dyn ResourceEncoder>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| Error::config(format!("Invalid xDS address: {}", e)))?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        Error::transport(format!("xDS server failed to bind to {}: {}", addr, e))
    })?;

    serve_xds(listener, config, cache, encoder, shutdown).await
}

/// Serve ADS on an already bound listener
pub async fn serve_xds(
    listener: TcpListener,
    config: &XdsConfig,
    cache: Arc<SnapshotCache>,
    encoder: Arc<dyn ResourceEncoder>,
    shutdown: CancellationToken,
) -> Result<()> {
    let local_addr = listener.local_addr()?;
    let service =
        SnapshotDiscoveryService::new(cache, encoder, config.ack_timeout(), shutdown.clone());

    let mut builder = Server::builder();
    if let Some(tls) = &config.tls {
        builder = builder.tls_config(xds_server_tls_config(tls)?)?;
    }

    info!(
        address = %local_addr,
        tls = config.tls.is_some(),
        ack_timeout_secs = config.ack_timeout_seconds,
        "xDS server listening"
    );

    let serve = builder
        .add_service(AggregatedDiscoveryServiceServer::new(service))
        .serve_with_incoming_shutdown(
            TcpListenerStream::new(listener),
            shutdown.clone().cancelled_owned(),
        );
    tokio::pin!(serve);

    tokio::select! {
        result = &mut serve => {
            result.map_err(|e| Error::transport(format!("xDS server failed: {}", e)))?;
            info!("xDS server stopped");
        }
        _ = grace_elapsed(&shutdown) => {
            warn!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "xDS connections still open after shutdown grace period; abandoning them"
            );
        }
    }

    Ok(())
}

async fn grace_elapsed(shutdown: &CancellationToken) {
    shutdown.cancelled().await;
    tokio::time::sleep(SHUTDOWN_GRACE).await;
}
