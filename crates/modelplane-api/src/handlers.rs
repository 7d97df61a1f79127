//! Request handlers
//!
//! Every tenant-scoped handler resolves the caller from the `Authorization`
//! header first, so a request without identity is rejected before its body
//! is looked at.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;

use modelplane_common::Tenant;
use modelplane_lifecycle::{ServingEndpoint, ServingStatus};
use modelplane_workload::{RunStatus, TrainingParams};

use crate::error::ApiError;
use crate::server::AppState;

/// Body of a successful `POST /training`
#[derive(Debug, Serialize)]
pub struct RunCreated {
    /// Generated run id
    pub id: String,
}

/// Body of `GET /training/{run_id}`
#[derive(Debug, Serialize)]
pub struct RunStatusResponse {
    /// Projected status of the run
    pub status: RunStatus,
}

/// Resolve the calling tenant from the opaque identity header
fn tenant(headers: &HeaderMap) -> Result<Tenant, ApiError> {
    // A value that is not visible ASCII cannot be a credential we issued
    let credential = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    Ok(Tenant::resolve(credential)?)
}

fn training_params(body: &Bytes) -> Result<TrainingParams, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(TrainingParams::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// `POST /training`
pub async fn create_training(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<RunCreated>), ApiError> {
    let tenant = tenant(&headers)?;
    let params = training_params(&body)?;

    let id = state
        .controller
        .create_training_run(&tenant, &params)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(RunCreated { id })))
}

/// `GET /training`
pub async fn list_training(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BTreeMap<String, RunStatus>>, ApiError> {
    let tenant = tenant(&headers)?;
    Ok(Json(state.controller.list_training_runs(&tenant).await?))
}

/// `GET /training/{run_id}`
pub async fn get_training(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(run_id): Path<String>,
) -> Result<Json<RunStatusResponse>, ApiError> {
    let tenant = tenant(&headers)?;
    let status = state.controller.get_training_run(&tenant, &run_id).await?;
    Ok(Json(RunStatusResponse { status }))
}

/// `POST /serving`
pub async fn create_serving(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<ServingEndpoint>), ApiError> {
    let tenant = tenant(&headers)?;
    let endpoint = state.controller.create_serving_deployment(&tenant).await?;
    Ok((StatusCode::CREATED, Json(endpoint)))
}

/// `GET /serving`
pub async fn get_serving(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ServingStatus>, ApiError> {
    let tenant = tenant(&headers)?;
    Ok(Json(state.controller.get_serving_deployment(&tenant).await?))
}

/// `DELETE /serving`
pub async fn delete_serving(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let tenant = tenant(&headers)?;
    state.controller.delete_serving_deployment(&tenant).await?;
    Ok(StatusCode::OK)
}
