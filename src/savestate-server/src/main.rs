//! SaveState server binary.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use savestate_server::config::DEFAULT_LISTEN_ADDR;
use savestate_server::{ServerConfig, run_with_shutdown};

/// SaveState checkpoint server
#[derive(Parser)]
#[command(name = "savestate-server")]
#[command(about = "HTTP API for git-backed save checkpoints")]
#[command(version)]
struct Args {
    /// Listen address
    #[arg(short, long, env = "SAVESTATE_LISTEN", default_value = DEFAULT_LISTEN_ADDR)]
    listen: String,

    /// Data directory holding the settings and the managed working directory
    #[arg(long, env = "SAVESTATE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Managed working directory (defaults to <data-dir>/workspace)
    #[arg(long, env = "SAVESTATE_WORKSPACE_DIR")]
    workspace_dir: Option<PathBuf>,

    /// Settings file (defaults to <data-dir>/config.json)
    #[arg(short, long, env = "SAVESTATE_CONFIG")]
    config: Option<PathBuf>,

    /// Plugin installation checkout used for update checks
    #[arg(long, env = "SAVESTATE_INSTALL_DIR")]
    install_dir: Option<PathBuf>,

    /// Seconds to wait for in-flight requests on shutdown
    #[arg(long, default_value_t = 30)]
    shutdown_timeout: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

async fn shutdown_signal(timeout: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down (timeout: {}s)", timeout),
        _ = terminate => info!("Received SIGTERM, shutting down (timeout: {}s)", timeout),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_logs);

    let config = ServerConfig {
        listen_addr: args.listen,
        data_dir: args.data_dir,
        workspace_dir: args.workspace_dir,
        config_file: args.config,
        install_dir: args.install_dir,
        shutdown_timeout: args.shutdown_timeout,
    };

    info!("Starting SaveState server on {}", config.listen_addr);
    info!("Press Ctrl+C to stop");

    let timeout = config.shutdown_timeout;
    let (stopping_tx, mut stopping_rx) = watch::channel(false);
    let shutdown = async move {
        shutdown_signal(timeout).await;
        let _ = stopping_tx.send(true);
    };
    let deadline = async move {
        if stopping_rx.wait_for(|stopping| *stopping).await.is_ok() {
            tokio::time::sleep(Duration::from_secs(timeout)).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    let result = tokio::select! {
        result = run_with_shutdown(config, shutdown) => result,
        _ = deadline => {
            error!("In-flight requests did not finish within {}s", timeout);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = result {
        error!("Server error: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}
