// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doctor_cell::ScheduleError;
use shared_database::DatabaseError;
use shared_config::AppConfig;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub pet_id: Uuid,
    pub clinic_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(self.duration_minutes)
    }

    /// Whether this appointment still occupies its slot.
    pub fn blocks_slot(&self) -> bool {
        self.status.blocks_slot()
    }
}

/// Appointment status. `scheduled` is the legacy name of `pending` and is
/// accepted wherever a status is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[serde(alias = "scheduled", alias = "Scheduled", alias = "Pending")]
    Pending,
    #[serde(alias = "Approved")]
    Approved,
    #[serde(alias = "Rejected")]
    Rejected,
    #[serde(alias = "Completed")]
    Completed,
    #[serde(alias = "Cancelled", alias = "canceled")]
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Rejected | AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }

    pub fn blocks_slot(&self) -> bool {
        *self != AppointmentStatus::Cancelled
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Approved => "approved",
            AppointmentStatus::Rejected => "rejected",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    /// Every stored literal that deserializes to this status, canonical first.
    pub fn spellings(&self) -> &'static [&'static str] {
        match self {
            AppointmentStatus::Pending => &["pending", "scheduled", "Scheduled", "Pending"],
            AppointmentStatus::Approved => &["approved", "Approved"],
            AppointmentStatus::Rejected => &["rejected", "Rejected"],
            AppointmentStatus::Completed => &["completed", "Completed"],
            AppointmentStatus::Cancelled => &["cancelled", "Cancelled", "canceled"],
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" | "scheduled" => Ok(AppointmentStatus::Pending),
            "approved" => Ok(AppointmentStatus::Approved),
            "rejected" => Ok(AppointmentStatus::Rejected),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" | "canceled" => Ok(AppointmentStatus::Cancelled),
            other => Err(AppointmentError::Validation(format!("Unknown appointment status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Approve,
    Reject,
    Cancel,
    Complete,
    /// Moving the slot; never changes status.
    Reschedule,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleEvent::Approve => "approve",
            LifecycleEvent::Reject => "reject",
            LifecycleEvent::Cancel => "cancel",
            LifecycleEvent::Complete => "complete",
            LifecycleEvent::Reschedule => "reschedule",
        };
        f.write_str(name)
    }
}

impl FromStr for LifecycleEvent {
    type Err = AppointmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "approve" => Ok(LifecycleEvent::Approve),
            "reject" => Ok(LifecycleEvent::Reject),
            "cancel" => Ok(LifecycleEvent::Cancel),
            "complete" => Ok(LifecycleEvent::Complete),
            "reschedule" => Ok(LifecycleEvent::Reschedule),
            other => Err(AppointmentError::Validation(format!("Unknown lifecycle event '{}'", other))),
        }
    }
}

// ==============================================================================
// ACTORS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    PetOwner,
    Doctor,
    Admin,
}

/// Whoever drives a booking or a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Actor {
    PetOwner { owner_id: Uuid },
    Doctor { doctor_id: Uuid },
    Admin,
}

impl Actor {
    pub fn role(&self) -> ActorRole {
        match self {
            Actor::PetOwner { .. } => ActorRole::PetOwner,
            Actor::Doctor { .. } => ActorRole::Doctor,
            Actor::Admin => ActorRole::Admin,
        }
    }

    /// Maps an authenticated subject and its role claim onto an actor.
    /// Any role other than `admin` or `doctor` is treated as a pet owner.
    pub fn from_claims(subject: &str, role: Option<&str>) -> Option<Actor> {
        match role {
            Some("admin") => Some(Actor::Admin),
            Some("doctor") => Uuid::parse_str(subject).ok().map(|doctor_id| Actor::Doctor { doctor_id }),
            _ => Uuid::parse_str(subject).ok().map(|owner_id| Actor::PetOwner { owner_id }),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    pub pet_id: Uuid,
    pub clinic_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_start_time: DateTime<Utc>,
    pub new_duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayNames {
    pub doctor_name: Option<String>,
    pub pet_name: Option<String>,
    pub clinic_name: Option<String>,
}

/// An appointment with the names of the entities it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub doctor_name: Option<String>,
    pub pet_name: Option<String>,
    pub clinic_name: Option<String>,
}

impl AppointmentDetails {
    pub fn new(appointment: Appointment, names: DisplayNames) -> Self {
        Self {
            appointment,
            doctor_name: names.doctor_name,
            pet_name: names.pet_name,
            clinic_name: names.clinic_name,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Appointment,
    Doctor,
    Pet,
    Clinic,
    ScheduleEntry,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Appointment => "Appointment",
            EntityKind::Doctor => "Doctor",
            EntityKind::Pet => "Pet",
            EntityKind::Clinic => "Clinic",
            EntityKind::ScheduleEntry => "Schedule entry",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: Uuid },

    #[error("Slot unavailable: {0}")]
    SlotUnavailable(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Cannot {event} an appointment that is {from}")]
    InvalidTransition { from: AppointmentStatus, event: LifecycleEvent },

    #[error("Only pending appointments can be withdrawn, this one is {0}")]
    NotWithdrawable(AppointmentStatus),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    #[error("Transient storage failure: {0}")]
    Retryable(String),
}

impl AppointmentError {
    pub fn not_found(entity: EntityKind, id: Uuid) -> Self {
        AppointmentError::NotFound { entity, id }
    }

    /// Typed outcomes the caller is expected to handle, as opposed to
    /// infrastructure faults.
    pub fn is_expected(&self) -> bool {
        !matches!(
            self,
            AppointmentError::Database(_) | AppointmentError::Timeout(_) | AppointmentError::Retryable(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppointmentError::Timeout(_) | AppointmentError::Retryable(_))
    }
}

impl From<ScheduleError> for AppointmentError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::InvalidRange(msg) => AppointmentError::InvalidRange(msg),
            ScheduleError::Conflict { .. } => AppointmentError::Conflict(e.to_string()),
            ScheduleError::NotFound(id) => AppointmentError::not_found(EntityKind::ScheduleEntry, id),
            ScheduleError::Database(msg) => AppointmentError::Database(msg),
        }
    }
}

impl From<DatabaseError> for AppointmentError {
    fn from(e: DatabaseError) -> Self {
        if e.is_retryable() {
            AppointmentError::Retryable(e.to_string())
        } else {
            AppointmentError::Database(e.to_string())
        }
    }
}

// ==============================================================================
// SCHEDULING RULES
// ==============================================================================

/// Longest appointment the slot locking scheme supports.
pub const MAX_SUPPORTED_DURATION_MINUTES: i64 = 24 * 60 - 1;

#[derive(Debug, Clone)]
pub struct SchedulingRules {
    pub default_duration_minutes: i64,
    pub max_duration_minutes: i64,
    pub slot_granularity_minutes: i64,
    pub booking_timeout: StdDuration,
    pub retry_attempts: u32,
    pub max_page_size: u32,
    /// Also reject slots whose end passes the end of the working window.
    pub require_end_within_hours: bool,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            default_duration_minutes: 30,
            max_duration_minutes: 480,
            slot_granularity_minutes: 15,
            booking_timeout: StdDuration::from_millis(5_000),
            retry_attempts: 1,
            max_page_size: 100,
            require_end_within_hours: false,
        }
    }
}

impl SchedulingRules {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_duration_minutes: config.default_appointment_minutes.max(1),
            max_duration_minutes: config
                .max_appointment_minutes
                .clamp(1, MAX_SUPPORTED_DURATION_MINUTES),
            slot_granularity_minutes: config.slot_granularity_minutes.max(1),
            booking_timeout: StdDuration::from_millis(config.booking_timeout_ms.max(1)),
            retry_attempts: config.booking_retry_attempts,
            max_page_size: u32::try_from(config.max_page_size).unwrap_or(u32::MAX).max(1),
            require_end_within_hours: config.require_end_within_hours,
        }
    }

    /// Applies the default and checks bounds.
    pub fn resolve_duration(&self, requested: Option<i64>) -> Result<i64, AppointmentError> {
        let minutes = requested.unwrap_or(self.default_duration_minutes);

        if minutes <= 0 {
            return Err(AppointmentError::Validation(
                "Duration must be a positive number of minutes".to_string(),
            ));
        }
        let max = self.max_duration_minutes.min(MAX_SUPPORTED_DURATION_MINUTES);
        if minutes > max {
            return Err(AppointmentError::Validation(format!(
                "Duration must not exceed {} minutes",
                max
            )));
        }

        Ok(minutes)
    }
}
