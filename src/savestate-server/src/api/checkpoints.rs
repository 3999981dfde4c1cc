//! Checkpoint lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use savestate_engine::{
    Checkpoint, CreatedCheckpoint, DeleteReport, DiffReport, InterruptedWorkReport, LoadReport,
    OverwriteReport, RenameReport, SaveStateService,
};

use crate::error::{ApiResponse, ApiResult};

use super::types::{CreateCheckpointRequest, DiffQuery, RenameCheckpointRequest};

pub async fn list_checkpoints(
    State(service): State<Arc<SaveStateService>>,
) -> ApiResult<Vec<Checkpoint>> {
    let checkpoints = service.list().await?;
    let message = format!("Found {} checkpoints", checkpoints.len());
    Ok(Json(ApiResponse::ok(message, checkpoints)))
}

pub async fn create_checkpoint(
    State(service): State<Arc<SaveStateService>>,
    payload: Result<Json<CreateCheckpointRequest>, JsonRejection>,
) -> ApiResult<CreatedCheckpoint> {
    let Json(request) = payload?;
    let outcome = service
        .create(&request.name, request.description.as_deref())
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn load_checkpoint(
    State(service): State<Arc<SaveStateService>>,
    Path(tag): Path<String>,
) -> ApiResult<LoadReport> {
    Ok(Json(service.load(&tag).await?.into()))
}

pub async fn delete_checkpoint(
    State(service): State<Arc<SaveStateService>>,
    Path(tag): Path<String>,
) -> ApiResult<DeleteReport> {
    Ok(Json(service.delete(&tag).await?.into()))
}

pub async fn rename_checkpoint(
    State(service): State<Arc<SaveStateService>>,
    Path(tag): Path<String>,
    payload: Result<Json<RenameCheckpointRequest>, JsonRejection>,
) -> ApiResult<RenameReport> {
    let Json(request) = payload?;
    let outcome = service
        .rename(&tag, &request.new_name, request.description.as_deref())
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn overwrite_checkpoint(
    State(service): State<Arc<SaveStateService>>,
    Path(tag): Path<String>,
) -> ApiResult<OverwriteReport> {
    Ok(Json(service.overwrite(&tag).await?.into()))
}

pub async fn diff_checkpoints(
    State(service): State<Arc<SaveStateService>>,
    query: Result<Query<DiffQuery>, QueryRejection>,
) -> ApiResult<DiffReport> {
    let Query(query) = query?;
    let report = service.diff(&query.ref1, &query.ref2).await?;
    let message = format!("{} files changed", report.files.len());
    Ok(Json(ApiResponse::ok(message, report)))
}

pub async fn apply_interrupted_work(
    State(service): State<Arc<SaveStateService>>,
) -> ApiResult<InterruptedWorkReport> {
    Ok(Json(service.apply_interrupted_work().await?.into()))
}

pub async fn discard_interrupted_work(
    State(service): State<Arc<SaveStateService>>,
) -> ApiResult<InterruptedWorkReport> {
    Ok(Json(service.discard_interrupted_work().await?.into()))
}
