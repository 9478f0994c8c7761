use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::{AppError, TenantId};

use crate::models::{
    AvailabilityQuery, BookAppointmentRequest, CancelAppointmentRequest, DateRange,
    RescheduleAppointmentRequest, SchedulingError,
};
use crate::services::agenda::AgendaService;
use crate::services::availability::AvailabilityService;
use crate::services::booking::BookingService;

pub struct SchedulingState {
    pub config: Arc<AppConfig>,
    pub booking: Arc<BookingService>,
    pub availability: Arc<AvailabilityService>,
    pub agenda: Arc<AgendaService>,
}

fn map_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::Validation(msg) => AppError::Validation(msg),
        SchedulingError::Conflict { interval } => AppError::Conflict(format!(
            "requested time collides with {} interval {} to {} on {}",
            if interval.blocked {
                "blocked"
            } else {
                "booked"
            },
            interval.start,
            interval.end,
            interval.date
        )),
        SchedulingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        SchedulingError::State { current } => {
            AppError::State(format!("appointment is currently {}", current))
        }
        SchedulingError::Store(msg) => AppError::Internal(msg),
    }
}

pub async fn get_availability(
    State(state): State<Arc<SchedulingState>>,
    Extension(tenant): Extension<TenantId>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state
        .availability
        .get_available_slots(tenant, &query)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "clinic_id": query.clinic_id,
        "date": query.date,
        "slots": slots
    })))
}

pub async fn book_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(tenant): Extension<TenantId>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    info!(
        "Booking request for patient {} at clinic {} on {}",
        request.patient_id, request.clinic_id, request.date
    );
    let outcome = state
        .booking
        .book(tenant, &request)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "appointments": outcome.appointments,
        "pattern_id": outcome.pattern_id,
        "skipped": outcome.skipped
    })))
}

pub async fn get_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(tenant): Extension<TenantId>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .get_appointment(tenant, appointment_id)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "appointment": appointment })))
}

pub async fn reschedule_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(tenant): Extension<TenantId>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    info!(
        "Reschedule request for appointment {} ({:?})",
        appointment_id, request.scope
    );
    let outcome = state
        .booking
        .reschedule(tenant, appointment_id, &request)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "affected": outcome.affected,
        "skipped_completed": outcome.skipped_completed,
        "skipped_conflicts": outcome.skipped_conflicts,
        "new_pattern_id": outcome.new_pattern_id
    })))
}

pub async fn cancel_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(tenant): Extension<TenantId>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    info!(
        "Cancel request for appointment {} ({:?})",
        appointment_id, request.scope
    );
    let outcome = state
        .booking
        .cancel(tenant, appointment_id, &request)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "affected": outcome.affected,
        "skipped_completed": outcome.skipped_completed,
        "skipped_conflicts": outcome.skipped_conflicts
    })))
}

#[derive(Debug, Deserialize)]
pub struct DailyAgendaQuery {
    pub clinic_id: Uuid,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

pub async fn get_daily_agenda(
    State(state): State<Arc<SchedulingState>>,
    Extension(tenant): Extension<TenantId>,
    Query(query): Query<DailyAgendaQuery>,
) -> Result<Json<Value>, AppError> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let day = state
        .agenda
        .daily(tenant, query.clinic_id, date)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "clinic_id": query.clinic_id,
        "agenda": day
    })))
}

#[derive(Debug, Deserialize)]
pub struct WeeklyAgendaQuery {
    pub clinic_id: Uuid,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

pub async fn get_weekly_agenda(
    State(state): State<Arc<SchedulingState>>,
    Extension(tenant): Extension<TenantId>,
    Query(query): Query<WeeklyAgendaQuery>,
) -> Result<Json<Value>, AppError> {
    let range = DateRange::new(query.from, query.to).map_err(map_error)?;
    let agenda = state
        .agenda
        .weekly(tenant, query.clinic_id, range)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({ "agenda": agenda })))
}
