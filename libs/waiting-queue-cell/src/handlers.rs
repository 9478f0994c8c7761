use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{AppError, TenantId};

use crate::error::QueueError;
use crate::models::{CheckInRequest, QueueQuery};
use crate::services::WaitingQueueService;

pub struct QueueState {
    pub config: Arc<AppConfig>,
    pub service: Arc<WaitingQueueService>,
}

fn map_error(e: QueueError) -> AppError {
    match e {
        QueueError::Validation(msg) => AppError::Validation(msg),
        QueueError::NotFound => AppError::NotFound("Queue entry not found".to_string()),
        QueueError::State { current } => {
            AppError::State(format!("entry is currently {}", current))
        }
        QueueError::Store(msg) => AppError::Internal(msg),
    }
}

/// List a clinic's queue for a day (today when unspecified).
pub async fn get_queue(
    State(state): State<Arc<QueueState>>,
    Extension(tenant): Extension<TenantId>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<Value>, AppError> {
    let day = query.day.unwrap_or_else(|| Utc::now().date_naive());
    let entries = state
        .service
        .list(tenant, query.clinic_id, day)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "clinic_id": query.clinic_id,
        "day": day,
        "entries": entries
    })))
}

pub async fn check_in(
    State(state): State<Arc<QueueState>>,
    Extension(tenant): Extension<TenantId>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<Value>, AppError> {
    info!(
        "Check-in request for patient {} at clinic {}",
        request.patient_id, request.clinic_id
    );
    let entry = state
        .service
        .check_in(tenant, &request)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "entry": entry
    })))
}

pub async fn call_next(
    State(state): State<Arc<QueueState>>,
    Extension(tenant): Extension<TenantId>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = state
        .service
        .call_next(tenant, clinic_id)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "entry": entry
    })))
}

pub async fn call_entry(
    State(state): State<Arc<QueueState>>,
    Extension(tenant): Extension<TenantId>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = state
        .service
        .call(tenant, entry_id)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "entry": entry
    })))
}

pub async fn start_service(
    State(state): State<Arc<QueueState>>,
    Extension(tenant): Extension<TenantId>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = state
        .service
        .start_service(tenant, entry_id)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "entry": entry
    })))
}

pub async fn complete_service(
    State(state): State<Arc<QueueState>>,
    Extension(tenant): Extension<TenantId>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = state
        .service
        .complete_service(tenant, entry_id)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "entry": entry
    })))
}

pub async fn skip_entry(
    State(state): State<Arc<QueueState>>,
    Extension(tenant): Extension<TenantId>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = state
        .service
        .skip(tenant, entry_id)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "entry": entry
    })))
}
