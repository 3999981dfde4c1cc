//! Settings, authorization, status and update endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use savestate_engine::{AuthorizeReport, SaveStateService, ServiceStatus, UpdateReport};
use savestate_storage::{ConfigPatch, ConfigView};

use crate::error::{ApiResponse, ApiResult};

use super::types::AuthorizeRequest;

/// Current settings with the token masked.
pub async fn get_config(State(service): State<Arc<SaveStateService>>) -> ApiResult<ConfigView> {
    Ok(Json(ApiResponse::ok(
        "Settings loaded",
        service.get_config().await,
    )))
}

pub async fn save_config(
    State(service): State<Arc<SaveStateService>>,
    payload: Result<Json<ConfigPatch>, JsonRejection>,
) -> ApiResult<ConfigView> {
    let Json(patch) = payload?;
    Ok(Json(service.save_config(patch).await?.into()))
}

/// Connect to the configured remote. The body is optional.
pub async fn authorize(
    State(service): State<Arc<SaveStateService>>,
    body: Bytes,
) -> ApiResult<AuthorizeReport> {
    let request: AuthorizeRequest = if body.iter().all(u8::is_ascii_whitespace) {
        AuthorizeRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };
    let branch = request
        .branch
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty());

    Ok(Json(service.authorize(branch).await?.into()))
}

pub async fn force_reinitialize(
    State(service): State<Arc<SaveStateService>>,
) -> ApiResult<AuthorizeReport> {
    Ok(Json(service.force_reinitialize().await?.into()))
}

pub async fn get_status(State(service): State<Arc<SaveStateService>>) -> ApiResult<ServiceStatus> {
    let status = service.status().await?;
    Ok(Json(ApiResponse::ok("Status loaded", status)))
}

pub async fn check_for_update(
    State(service): State<Arc<SaveStateService>>,
) -> ApiResult<UpdateReport> {
    let report = service.check_for_update().await?;
    let message = if report.update_available {
        format!("Update available ({} commits behind)", report.behind)
    } else {
        "Up to date".to_string()
    };
    Ok(Json(ApiResponse::ok(message, report)))
}
