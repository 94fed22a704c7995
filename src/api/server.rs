use std::net::SocketAddr;
use std::sync::Arc;

use axum::{serve::Listener, Router};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_rustls::{server::TlsStream, TlsAcceptor};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::{tls::rustls_server_config, AdminConfig},
    errors::Error,
    services::ApiDeployer,
};

use super::{auth::AdminCredentials, routes::build_router};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const HANDSHAKE_BACKLOG: usize = 64;

pub async fn start_admin_server(
    config: &AdminConfig,
    deployer: Arc<ApiDeployer>,
    shutdown: CancellationToken,
) -> crate::Result<()> {
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| Error::config(format!("Invalid admin API address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::transport(format!("Failed to bind admin API server: {}", e)))?;

    serve_admin(listener, config, deployer, shutdown).await
}

/// Serve the admin API on an already bound listener
pub async fn serve_admin(
    listener: TcpListener,
    config: &AdminConfig,
    deployer: Arc<ApiDeployer>,
    shutdown: CancellationToken,
) -> crate::Result<()> {
    let addr = listener.local_addr()?;
    let router =
        build_router(deployer, AdminCredentials::from(config), config.max_bundle_bytes);

    if let Some(tls) = config.tls.as_ref() {
        let acceptor = TlsAcceptor::from(rustls_server_config(tls)?);
        info!(address = %addr, cert = %tls.cert_path.display(), "Starting HTTPS admin API server");
        run_tls_server(listener, acceptor, router, shutdown).await?;
    } else {
        info!(address = %addr, "Starting HTTP admin API server");
        run_http_server(listener, router, shutdown).await?;
    }

    info!("Admin API server shutdown completed");
    Ok(())
}

async fn run_http_server(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> crate::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| Error::transport(format!("Admin API server error: {}", e)))
}

async fn run_tls_server(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    router: Router,
    shutdown: CancellationToken,
) -> crate::Result<()> {
    let tls_listener = TlsListener::new(listener, acceptor)?;
    axum::serve(tls_listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| Error::transport(format!("HTTPS admin API server error: {}", e)))
}

/// TLS listener whose handshakes run on their own tasks, so a client that
/// never finishes one cannot hold up later connections.
struct TlsListener {
    local_addr: SocketAddr,
    ready: mpsc::Receiver<(TlsStream<TcpStream>, SocketAddr)>,
    accept_task: JoinHandle<()>,
}

impl TlsListener {
    fn new(listener: TcpListener, acceptor: TlsAcceptor) -> std::io::Result<Self> {
        let local_addr = listener.local_addr()?;
        let (tx, ready) = mpsc::channel(HANDSHAKE_BACKLOG);
        let accept_task = tokio::spawn(accept_connections(listener, acceptor, tx));
        Ok(Self { local_addr, ready, accept_task })
    }
}

impl Drop for TlsListener {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

impl Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        match self.ready.recv().await {
            Some(connection) => connection,
            None => std::future::pending().await,
        }
    }

    fn local_addr(&self) -> std::io::Result<Self::Addr> {
        Ok(self.local_addr)
    }
}

async fn accept_connections(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    ready: mpsc::Sender<(TlsStream<TcpStream>, SocketAddr)>,
) {
    loop {
        let (stream, addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(connection) => connection,
                Err(err) => {
                    if !is_connection_error(&err) {
                        error!("HTTPS accept error: {err}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                    continue;
                }
            },
            _ = ready.closed() => return,
        };

        let acceptor = acceptor.clone();
        let ready = ready.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                Ok(Ok(tls_stream)) => {
                    if ready.send((tls_stream, addr)).await.is_err() {
                        debug!(%addr, "Admin listener closed before connection was served");
                    }
                }
                Ok(Err(err)) => warn!(error = %err, %addr, "TLS handshake failed"),
                Err(_) => warn!(
                    %addr,
                    timeout_secs = HANDSHAKE_TIMEOUT.as_secs(),
                    "TLS handshake timed out"
                ),
            }
        });
    }
}

fn is_connection_error(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
    )
}
