use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use flowgate::{
    config::{load_config, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH},
    observability::{init_logging, load_or_default},
    ControlPlane, APP_NAME, VERSION,
};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "flowgate")]
#[command(about = "API gateway control plane for Envoy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Path to the primary TOML configuration
    #[arg(long, env = CONFIG_PATH_ENV, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

fn install_rustls_provider() {
    use rustls::crypto::{ring, CryptoProvider};

    if CryptoProvider::get_default().is_none() {
        let _ = ring::default_provider().install_default();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", APP_NAME, e);
            return ExitCode::FAILURE;
        }
    };

    let (log_config, log_fallback) = load_or_default(&config.logging.config_path);
    let log_handle = match init_logging(&log_config) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Warning: {}", e);
            None
        }
    };
    if let Some(reason) = log_fallback {
        warn!(
            path = %config.logging.config_path.display(),
            error = %reason,
            "Logging config unavailable; using defaults"
        );
    }

    install_rustls_provider();

    info!(
        app_name = APP_NAME,
        version = VERSION,
        config = %args.config.display(),
        "Starting flowgate control plane"
    );

    match ControlPlane::new(config).run(log_handle).await {
        Ok(()) => {
            info!("Control plane shutdown completed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Control plane terminated with error");
            ExitCode::FAILURE
        }
    }
}
