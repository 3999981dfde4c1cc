//! SaveState server: HTTP API over the checkpoint engine.
//!
//! Every route lives under `/api` and answers with the
//! `{ success, message, details?, code?, warnings?, data? }` envelope.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod api;
pub mod config;
pub mod error;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use savestate_engine::SaveStateService;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResponse, ApiResult};

/// Run the server with the given configuration.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    run_with_shutdown(config, std::future::pending()).await
}

/// Run the server with graceful shutdown support.
pub async fn run_with_shutdown<F>(config: ServerConfig, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let paths = config.paths()?;
    info!(
        data_dir = %paths.data_dir.display(),
        workspace = %paths.workspace_dir.display(),
        "Opening SaveState data directory"
    );

    let service = Arc::new(SaveStateService::open(paths).await?);
    service.start().await;
    let app = create_router(Arc::clone(&service));

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutting down, letting any running auto-save finish");
    service.scheduler().shutdown().await;
    Ok(())
}

/// Create the application router.
pub fn create_router(service: Arc<SaveStateService>) -> Router {
    Router::new()
        .nest("/api", api::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}
