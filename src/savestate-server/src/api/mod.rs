//! REST API routes and handlers.

mod checkpoints;
mod health;
mod settings;
pub mod types;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use savestate_engine::SaveStateService;

pub use types::{
    AuthorizeRequest, CreateCheckpointRequest, DiffQuery, HealthResponse,
    RenameCheckpointRequest,
};

/// Create the API routes.
pub fn routes() -> Router<Arc<SaveStateService>> {
    Router::new()
        .route("/health", get(health::health_check))
        // Settings and connection
        .route("/config", get(settings::get_config).post(settings::save_config))
        .route("/authorize", post(settings::authorize))
        .route("/reinitialize", post(settings::force_reinitialize))
        .route("/status", get(settings::get_status))
        .route("/update", get(settings::check_for_update))
        // Checkpoints
        .route(
            "/checkpoints",
            get(checkpoints::list_checkpoints).post(checkpoints::create_checkpoint),
        )
        .route("/checkpoints/{tag}", delete(checkpoints::delete_checkpoint))
        .route("/checkpoints/{tag}/load", post(checkpoints::load_checkpoint))
        .route("/checkpoints/{tag}/rename", post(checkpoints::rename_checkpoint))
        .route(
            "/checkpoints/{tag}/overwrite",
            post(checkpoints::overwrite_checkpoint),
        )
        .route("/diff", get(checkpoints::diff_checkpoints))
        // Interrupted work
        .route(
            "/interrupted-work/apply",
            post(checkpoints::apply_interrupted_work),
        )
        .route(
            "/interrupted-work/discard",
            post(checkpoints::discard_interrupted_work),
        )
}
