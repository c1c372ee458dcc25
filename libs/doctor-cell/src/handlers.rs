use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateScheduleEntryRequest, ScheduleError};
use crate::services::ScheduleCalendar;

#[derive(Clone)]
pub struct ScheduleState {
    pub config: Arc<AppConfig>,
    pub calendar: Arc<ScheduleCalendar>,
}

pub fn schedule_error_to_app_error(e: ScheduleError) -> AppError {
    match e {
        ScheduleError::InvalidRange(msg) => AppError::ValidationError(msg),
        ScheduleError::Conflict { .. } => AppError::Conflict(format!("Schedule conflict: {}", e)),
        ScheduleError::NotFound(_) => AppError::NotFound(e.to_string()),
        ScheduleError::Database(msg) => AppError::Database(msg),
    }
}

/// Admins manage every schedule; a doctor manages only their own.
fn ensure_can_manage(user: &User, doctor_id: Uuid) -> Result<(), AppError> {
    let is_admin = user.is_admin();
    let is_self = user.has_role("doctor") && user.id == doctor_id.to_string();

    if !is_admin && !is_self {
        warn!("User {} attempted to manage schedule of doctor {}", user.id, doctor_id);
        return Err(AppError::Forbidden(
            "Not authorized to manage this doctor's schedule".to_string(),
        ));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn get_doctor_schedule(
    State(state): State<ScheduleState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entries = state
        .calendar
        .entries_for_doctor(doctor_id)
        .await
        .map_err(schedule_error_to_app_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "entries": entries,
    })))
}

#[axum::debug_handler]
pub async fn create_schedule_entry(
    State(state): State<ScheduleState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateScheduleEntryRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_can_manage(&user, doctor_id)?;

    let entry = state
        .calendar
        .add_entry(doctor_id, request.day_of_week, request.start_time, request.end_time)
        .await
        .map_err(schedule_error_to_app_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "entry": entry,
        })),
    ))
}

#[axum::debug_handler]
pub async fn delete_schedule_entry(
    State(state): State<ScheduleState>,
    Path((doctor_id, schedule_id)): Path<(Uuid, Uuid)>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    ensure_can_manage(&user, doctor_id)?;

    let entry = state
        .calendar
        .entry_by_id(schedule_id)
        .await
        .map_err(schedule_error_to_app_error)?;

    match entry {
        Some(entry) if entry.doctor_id == doctor_id => {}
        _ => return Err(schedule_error_to_app_error(ScheduleError::NotFound(schedule_id))),
    }

    state
        .calendar
        .remove_entry(schedule_id)
        .await
        .map_err(schedule_error_to_app_error)?;

    Ok(StatusCode::NO_CONTENT)
}
