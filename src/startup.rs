//! Process wiring for the control plane
//!
//! Starts the xDS and admin servers side by side, runs the logging-config
//! watcher, and coordinates shutdown: on SIGINT/SIGTERM both servers stop
//! accepting connections, then any in-flight publish is allowed to finish.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api::start_admin_server;
use crate::compiler::{CompilerOptions, ListenerSettings};
use crate::config::AppConfig;
use crate::observability::{LogConfigWatcher, LogReloadHandle};
use crate::services::ApiDeployer;
use crate::xds::{start_xds_server, EnvoyV3Encoder, ResourceEncoder, SnapshotCache};
use crate::Result;

/// The assembled control plane
pub struct ControlPlane {
    config: AppConfig,
    cache: Arc<SnapshotCache>,
    deployer: Arc<ApiDeployer>,
    encoder: Arc<dyn ResourceEncoder>,
    shutdown: CancellationToken,
}

impl ControlPlane {
    pub fn new(config: AppConfig) -> Self {
        let cache = Arc::new(SnapshotCache::new());
        let deployer = Arc::new(ApiDeployer::new(
            cache.clone(),
            CompilerOptions::from(&config.router),
            ListenerSettings::from(&config.router),
        )
        .with_max_extracted_bytes(config.admin.max_extracted_bytes));

        Self {
            config,
            cache,
            deployer,
            encoder: Arc::new(EnvoyV3Encoder),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    pub fn deployer(&self) -> &Arc<ApiDeployer> {
        &self.deployer
    }

    /// Token that stops both servers when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serve until a termination signal arrives or a server fails
    pub async fn run(self, log_handle: Option<LogReloadHandle>) -> Result<()> {
        if let Some(handle) = log_handle {
            let watcher = LogConfigWatcher::new(self.config.logging.config_path.clone(), handle);
            if let Err(err) = watcher.spawn(self.shutdown.clone()) {
                warn!(error = %err, "Logging config hot reload disabled");
            }
        }

        let signal_token = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = wait_for_signal() => {
                    info!("Shutdown signal received");
                    signal_token.cancel();
                }
                _ = signal_token.cancelled() => {}
            }
        });

        self.serve().await
    }

    /// Run both servers until the shutdown token is cancelled
    pub async fn serve(self) -> Result<()> {
        info!(
            xds_address = %self.config.xds.bind_address(),
            admin_address = %self.config.admin.bind_address(),
            listener_port = self.config.router.listener_port,
            "Starting flowgate control plane"
        );

        let xds_task = start_xds_server(
            &self.config.xds,
            self.cache.clone(),
            self.encoder.clone(),
            self.shutdown.clone(),
        );
        let admin_task =
            start_admin_server(&self.config.admin, self.deployer.clone(), self.shutdown.clone());

        let result = tokio::try_join!(xds_task, admin_task).map(|_| ());
        if let Err(err) = &result {
            error!(error = %err, "Control plane server terminated with error");
            self.shutdown.cancel();
        }

        let _publish = self.deployer.publish_lock().await;
        info!(labels = self.cache.labels().len(), "Pending publishes drained; control plane stopped");

        result
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.xds.bind_address = "127.0.0.1".into();
        config.xds.port = 0;
        config.admin.bind_address = "127.0.0.1".into();
        config.admin.port = 0;
        config.admin.username = "admin".into();
        config.admin.password = "secret".into();
        config
    }

    #[tokio::test]
    async fn stops_when_token_is_cancelled() {
        let plane = ControlPlane::new(config());
        let token = plane.shutdown_token();

        let task = tokio::spawn(plane.serve());
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        token.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .expect("control plane stops")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn bind_failure_cancels_the_other_server() {
        let mut config = config();
        config.xds.bind_address = "not-an-address".into();

        let plane = ControlPlane::new(config);
        let token = plane.shutdown_token();
        let result = plane.serve().await;

        assert!(result.is_err());
        assert!(token.is_cancelled());
    }
}
