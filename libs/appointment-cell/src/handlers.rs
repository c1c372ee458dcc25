// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    Actor, AppointmentError, AppointmentStatus, CreateAppointmentRequest, LifecycleEvent,
    RescheduleAppointmentRequest,
};
use crate::services::query::{AppointmentFilter, AppointmentQuery};
use crate::services::scheduler::AppointmentScheduler;

const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_SUGGESTION_LIMIT: usize = 10;
const MAX_SUGGESTION_LIMIT: usize = 100;

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub scheduler: Arc<AppointmentScheduler>,
    pub query: Arc<AppointmentQuery>,
}

pub fn appointment_error_to_app_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound { .. } => AppError::NotFound(e.to_string()),
        AppointmentError::SlotUnavailable(reason) => {
            AppError::Conflict(format!("Requested slot unavailable: {}", reason))
        }
        AppointmentError::Conflict(msg) => AppError::Conflict(format!("Schedule conflict: {}", msg)),
        AppointmentError::InvalidRange(msg) => AppError::ValidationError(msg),
        AppointmentError::Validation(msg) => AppError::ValidationError(msg),
        AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
        AppointmentError::InvalidTransition { .. } | AppointmentError::NotWithdrawable(_) => {
            AppError::Unprocessable(e.to_string())
        }
        AppointmentError::Database(msg) => AppError::Database(msg),
        AppointmentError::Timeout(_) | AppointmentError::Retryable(_) => AppError::Internal(e.to_string()),
    }
}

pub fn actor_from_user(user: &User) -> Result<Actor, AppError> {
    Actor::from_claims(&user.id, user.role.as_deref())
        .ok_or_else(|| AppError::Auth("Token subject is not a valid user id".to_string()))
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = actor_from_user(&user)?;

    let appointment = state
        .scheduler
        .create(&actor, request)
        .await
        .map_err(appointment_error_to_app_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;

    let details = state
        .scheduler
        .get(appointment_id)
        .await
        .map_err(appointment_error_to_app_error)?;

    let pet_owner = state
        .scheduler
        .pet_owner(details.appointment.pet_id)
        .await
        .map_err(appointment_error_to_app_error)?;

    if !state.scheduler.lifecycle().is_related(&actor, &details.appointment, pet_owner) {
        warn!("User {} attempted to read appointment {}", user.id, appointment_id);
        return Err(AppError::Forbidden("Not authorized to view this appointment".to_string()));
    }

    let valid_events = state
        .scheduler
        .lifecycle()
        .valid_events(details.appointment.status, actor.role());

    Ok(Json(json!({
        "appointment": details,
        "valid_events": valid_events,
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;

    let appointment = state
        .scheduler
        .reschedule(&actor, appointment_id, request)
        .await
        .map_err(appointment_error_to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

// ==============================================================================
// STATUS CHANGES
// ==============================================================================

async fn apply_event(
    state: &AppointmentState,
    user: &User,
    appointment_id: Uuid,
    event: LifecycleEvent,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(user)?;

    let appointment = state
        .scheduler
        .transition(&actor, appointment_id, event)
        .await
        .map_err(appointment_error_to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn approve_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    apply_event(&state, &user, appointment_id, LifecycleEvent::Approve).await
}

#[axum::debug_handler]
pub async fn reject_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    apply_event(&state, &user, appointment_id, LifecycleEvent::Reject).await
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    apply_event(&state, &user, appointment_id, LifecycleEvent::Cancel).await
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    apply_event(&state, &user, appointment_id, LifecycleEvent::Complete).await
}

/// Pending appointments only, by the pet's owner or an admin.
#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, AppError> {
    let actor = actor_from_user(&user)?;

    state
        .scheduler
        .withdraw(&actor, appointment_id)
        .await
        .map_err(|e| {
            if matches!(e, AppointmentError::Forbidden(_)) {
                warn!("User {} attempted to delete appointment {}", user.id, appointment_id);
            }
            appointment_error_to_app_error(e)
        })?;

    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// SEARCH & AVAILABILITY
// ==============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentSearchParams {
    pub doctor_id: Option<Uuid>,
    pub pet_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
    pub status: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Doctors see their own bookings; owners the bookings of one of their pets.
async fn scoped_filter(
    state: &AppointmentState,
    actor: &Actor,
    params: &AppointmentSearchParams,
) -> Result<AppointmentFilter, AppError> {
    let mut filter = AppointmentFilter::new();

    match actor {
        Actor::Admin => {
            if let Some(doctor_id) = params.doctor_id {
                filter = filter.doctor(doctor_id);
            }
            if let Some(pet_id) = params.pet_id {
                filter = filter.pet(pet_id);
            }
        }
        Actor::Doctor { doctor_id } => {
            if params.doctor_id.is_some_and(|requested| requested != *doctor_id) {
                return Err(AppError::Forbidden("Doctors can only list their own appointments".to_string()));
            }
            filter = filter.doctor(*doctor_id);
            if let Some(pet_id) = params.pet_id {
                filter = filter.pet(pet_id);
            }
        }
        Actor::PetOwner { owner_id } => {
            let pet_id = params.pet_id.ok_or_else(|| {
                AppError::BadRequest("pet_id is required when listing your appointments".to_string())
            })?;
            let pet_owner = state
                .scheduler
                .pet_owner(pet_id)
                .await
                .map_err(appointment_error_to_app_error)?;
            if pet_owner != Some(*owner_id) {
                return Err(AppError::Forbidden("You can only list appointments of your own pets".to_string()));
            }
            filter = filter.pet(pet_id);
            if let Some(doctor_id) = params.doctor_id {
                filter = filter.doctor(doctor_id);
            }
        }
    }

    if let Some(clinic_id) = params.clinic_id {
        filter = filter.clinic(clinic_id);
    }
    if let Some(status) = params.status.as_deref() {
        let status = status.parse::<AppointmentStatus>().map_err(appointment_error_to_app_error)?;
        filter = filter.status(status);
    }
    if let Some(q) = params.q.as_deref() {
        filter = filter.text(q);
    }

    Ok(filter.between(params.from, params.to))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(params): Query<AppointmentSearchParams>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let filter = scoped_filter(&state, &actor, &params).await?;

    let page = state
        .query
        .search(
            &filter,
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await
        .map_err(appointment_error_to_app_error)?;

    debug!("Search returned {} of {} appointments", page.items.len(), page.total_count);

    Ok(Json(json!({
        "appointments": page.items,
        "total_count": page.total_count,
        "page": page.page_index,
        "page_size": page.page_size,
    })))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
}

#[axum::debug_handler]
pub async fn check_availability(
    State(state): State<AppointmentState>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<Value>, AppError> {
    let verdict = state
        .scheduler
        .availability_verdict(params.doctor_id, params.start_time, params.duration_minutes)
        .await
        .map_err(appointment_error_to_app_error)?;

    Ok(Json(json!({
        "doctor_id": params.doctor_id,
        "start_time": params.start_time,
        "available": verdict.is_available(),
        "reason": verdict.describe(),
        "verdict": verdict,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SuggestionParams {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub duration_minutes: Option<i64>,
    pub limit: Option<usize>,
}

#[axum::debug_handler]
pub async fn suggest_slots(
    State(state): State<AppointmentState>,
    Query(params): Query<SuggestionParams>,
) -> Result<Json<Value>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SUGGESTION_LIMIT)
        .min(MAX_SUGGESTION_LIMIT);

    let slots = state
        .scheduler
        .suggest_slots(params.doctor_id, params.date, params.duration_minutes, limit)
        .await
        .map_err(appointment_error_to_app_error)?;

    Ok(Json(json!({
        "doctor_id": params.doctor_id,
        "date": params.date,
        "slots": slots,
    })))
}

// ==============================================================================
// DOCTOR REMOVAL
// ==============================================================================

#[axum::debug_handler]
pub async fn purge_doctor(
    State(state): State<AppointmentState>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        warn!("Non-admin user {} attempted to purge doctor {}", user.id, doctor_id);
        return Err(AppError::Forbidden("Only admins can remove a doctor's bookings".to_string()));
    }

    let summary = state
        .scheduler
        .purge_doctor(doctor_id)
        .await
        .map_err(appointment_error_to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor_id": doctor_id,
        "appointments_removed": summary.appointments_removed,
        "schedule_entries_removed": summary.schedule_entries_removed,
    })))
}
