// libs/appointment-cell/src/services/scheduler.rs
use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::ScheduleCalendar;

use crate::directory::EntityDirectory;
use crate::models::{
    Actor, Appointment, AppointmentDetails, AppointmentError, CreateAppointmentRequest, EntityKind,
    LifecycleEvent, RescheduleAppointmentRequest, SchedulingRules,
};
use crate::repository::AppointmentRepository;
use crate::services::availability::{days_to_scan, AvailabilityChecker, AvailabilityVerdict};
use crate::services::lifecycle::AppointmentLifecycle;
use crate::services::locks::SlotLocks;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurgeSummary {
    pub appointments_removed: u64,
    pub schedule_entries_removed: u64,
}

/// Write side of appointment booking.
///
/// Every write that depends on a doctor's bookings runs under the slot locks
/// of the days it reads, bounded by the booking timeout and retried when the
/// failure is transient.
pub struct AppointmentScheduler {
    appointments: Arc<dyn AppointmentRepository>,
    directory: Arc<dyn EntityDirectory>,
    calendar: Arc<ScheduleCalendar>,
    availability: AvailabilityChecker,
    lifecycle: AppointmentLifecycle,
    locks: Arc<SlotLocks>,
    rules: SchedulingRules,
}

impl AppointmentScheduler {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        directory: Arc<dyn EntityDirectory>,
        calendar: Arc<ScheduleCalendar>,
        rules: SchedulingRules,
    ) -> Self {
        let availability = AvailabilityChecker::new(
            Arc::clone(&calendar),
            Arc::clone(&appointments),
            rules.clone(),
        );

        Self {
            appointments,
            directory,
            calendar,
            availability,
            lifecycle: AppointmentLifecycle::new(),
            locks: Arc::new(SlotLocks::new()),
            rules,
        }
    }

    pub fn rules(&self) -> &SchedulingRules {
        &self.rules
    }

    pub fn lifecycle(&self) -> &AppointmentLifecycle {
        &self.lifecycle
    }

    // ==============================================================================
    // BOOKING
    // ==============================================================================

    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id, pet_id = %request.pet_id))]
    pub async fn create(
        &self,
        actor: &Actor,
        request: CreateAppointmentRequest,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let (doctor_exists, pet_exists, clinic_exists) = futures::try_join!(
            self.directory.doctor_exists(request.doctor_id),
            self.directory.pet_exists(request.pet_id),
            self.directory.clinic_exists(request.clinic_id),
        )?;

        if !doctor_exists {
            return Err(AppointmentError::not_found(EntityKind::Doctor, request.doctor_id));
        }
        if !pet_exists {
            return Err(AppointmentError::not_found(EntityKind::Pet, request.pet_id));
        }
        if !clinic_exists {
            return Err(AppointmentError::not_found(EntityKind::Clinic, request.clinic_id));
        }

        let pet_owner = self.directory.pet_owner(request.pet_id).await?;
        self.lifecycle.authorize_create(actor, pet_owner)?;

        let duration_minutes = self.rules.resolve_duration(request.duration_minutes)?;

        let now = Utc::now();
        let candidate = Appointment {
            id: Uuid::new_v4(),
            doctor_id: request.doctor_id,
            pet_id: request.pet_id,
            clinic_id: request.clinic_id,
            start_time: request.start_time,
            duration_minutes,
            status: self.lifecycle.initial_status(),
            reason: request.reason,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };

        let booked = self.run_bounded("create", || self.try_book(&candidate)).await?;

        info!(
            "Appointment {} booked with doctor {} at {} for {} min",
            booked.id, booked.doctor_id, booked.start_time, booked.duration_minutes
        );
        self.get(booked.id).await
    }

    async fn try_book(&self, candidate: &Appointment) -> Result<Appointment, AppointmentError> {
        let days = days_to_scan(candidate.start_time, candidate.end_time());
        let _guard = self.locks.acquire(candidate.doctor_id, &days).await;

        // A retried attempt may find its own earlier insert.
        if let Some(existing) = self.appointments.find_by_id(candidate.id).await? {
            return Ok(existing);
        }

        let verdict = self
            .availability
            .check(candidate.doctor_id, candidate.start_time, candidate.duration_minutes, None)
            .await?;

        if !verdict.is_available() {
            return Err(AppointmentError::SlotUnavailable(verdict.describe()));
        }

        self.appointments.insert(candidate.clone()).await
    }

    #[instrument(skip(self, request), fields(new_start = %request.new_start_time))]
    pub async fn reschedule(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let moved = self
            .run_bounded("reschedule", || self.try_reschedule(actor, appointment_id, &request))
            .await?;

        info!(
            "Appointment {} moved to {} ({} min)",
            moved.id, moved.start_time, moved.duration_minutes
        );
        self.get(moved.id).await
    }

    async fn try_reschedule(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        request: &RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.require(appointment_id).await?;
        let pet_owner = self.directory.pet_owner(current.pet_id).await?;
        self.lifecycle.authorize_reschedule(actor, &current, pet_owner)?;

        let duration_minutes = self
            .rules
            .resolve_duration(Some(request.new_duration_minutes.unwrap_or(current.duration_minutes)))?;
        let new_start = request.new_start_time;
        let new_end = new_start + Duration::minutes(duration_minutes);

        let original_day = current.start_time.date_naive();
        let mut days = days_to_scan(new_start, new_end);
        days.push(original_day);
        let _guard = self.locks.acquire(current.doctor_id, &days).await;

        let current = self.require_unmoved(appointment_id, original_day).await?;
        self.lifecycle.authorize_reschedule(actor, &current, pet_owner)?;

        let verdict = self
            .availability
            .check(current.doctor_id, new_start, duration_minutes, Some(current.id))
            .await?;
        if !verdict.is_available() {
            return Err(AppointmentError::SlotUnavailable(verdict.describe()));
        }

        self.appointments
            .update(Appointment {
                start_time: new_start,
                duration_minutes,
                updated_at: Utc::now(),
                ..current
            })
            .await
    }

    // ==============================================================================
    // STATUS CHANGES
    // ==============================================================================

    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        event: LifecycleEvent,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let updated = self
            .run_bounded("transition", || self.try_transition(actor, appointment_id, event))
            .await?;

        info!("Appointment {} is now {} after {}", updated.id, updated.status, event);
        self.get(updated.id).await
    }

    async fn try_transition(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        event: LifecycleEvent,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.require(appointment_id).await?;
        let day = current.start_time.date_naive();
        let _guard = self.locks.acquire(current.doctor_id, &[day]).await;

        let current = self.require_unmoved(appointment_id, day).await?;
        let pet_owner = self.directory.pet_owner(current.pet_id).await?;
        let next = self.lifecycle.authorize_transition(actor, &current, pet_owner, event)?;

        self.appointments
            .update(Appointment {
                status: next,
                updated_at: Utc::now(),
                ..current
            })
            .await
    }

    /// Hard delete without status checks.
    #[instrument(skip(self))]
    pub async fn delete(&self, appointment_id: Uuid) -> Result<(), AppointmentError> {
        let current = self.require(appointment_id).await?;
        let _guard = self
            .locks
            .acquire(current.doctor_id, &[current.start_time.date_naive()])
            .await;

        if !self.appointments.delete(appointment_id).await? {
            return Err(AppointmentError::not_found(EntityKind::Appointment, appointment_id));
        }

        info!("Appointment {} deleted", appointment_id);
        Ok(())
    }

    /// Deletes a Pending appointment on behalf of `actor`. Status and
    /// ownership are re-read under the slot lock.
    #[instrument(skip(self))]
    pub async fn withdraw(&self, actor: &Actor, appointment_id: Uuid) -> Result<(), AppointmentError> {
        self.run_bounded("withdraw", || self.try_withdraw(actor, appointment_id))
            .await?;

        info!("Appointment {} withdrawn", appointment_id);
        Ok(())
    }

    async fn try_withdraw(&self, actor: &Actor, appointment_id: Uuid) -> Result<(), AppointmentError> {
        let current = self.require(appointment_id).await?;
        let day = current.start_time.date_naive();
        let _guard = self.locks.acquire(current.doctor_id, &[day]).await;

        let current = self.require_unmoved(appointment_id, day).await?;
        let pet_owner = self.directory.pet_owner(current.pet_id).await?;
        self.lifecycle.authorize_withdraw(actor, &current, pet_owner)?;

        if !self.appointments.delete(appointment_id).await? {
            return Err(AppointmentError::not_found(EntityKind::Appointment, appointment_id));
        }
        Ok(())
    }

    /// Removes every appointment and schedule entry of a doctor.
    #[instrument(skip(self))]
    pub async fn purge_doctor(&self, doctor_id: Uuid) -> Result<PurgeSummary, AppointmentError> {
        let appointments_removed = self.appointments.delete_by_doctor(doctor_id).await?;
        let schedule_entries_removed = self.calendar.purge_doctor(doctor_id).await?;

        info!(
            "Purged doctor {}: {} appointments, {} schedule entries",
            doctor_id, appointments_removed, schedule_entries_removed
        );
        Ok(PurgeSummary { appointments_removed, schedule_entries_removed })
    }

    // ==============================================================================
    // READS
    // ==============================================================================

    pub async fn get(&self, appointment_id: Uuid) -> Result<AppointmentDetails, AppointmentError> {
        let appointment = self.require(appointment_id).await?;
        let names = self
            .directory
            .display_names(appointment.doctor_id, appointment.pet_id, appointment.clinic_id)
            .await?;

        Ok(AppointmentDetails::new(appointment, names))
    }

    pub async fn pet_owner(&self, pet_id: Uuid) -> Result<Option<Uuid>, AppointmentError> {
        self.directory.pet_owner(pet_id).await
    }

    pub async fn check_availability(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<bool, AppointmentError> {
        Ok(self
            .availability_verdict(doctor_id, start, Some(duration_minutes))
            .await?
            .is_available())
    }

    pub async fn availability_verdict(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        duration_minutes: Option<i64>,
    ) -> Result<AvailabilityVerdict, AppointmentError> {
        let duration_minutes = self.rules.resolve_duration(duration_minutes)?;
        self.availability.check(doctor_id, start, duration_minutes, None).await
    }

    pub async fn suggest_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        duration_minutes: Option<i64>,
        limit: usize,
    ) -> Result<Vec<DateTime<Utc>>, AppointmentError> {
        if !self.directory.doctor_exists(doctor_id).await? {
            return Err(AppointmentError::not_found(EntityKind::Doctor, doctor_id));
        }

        let duration_minutes = self.rules.resolve_duration(duration_minutes)?;
        self.availability
            .suggest_slots(doctor_id, date, duration_minutes, limit)
            .await
    }

    // ==============================================================================
    // HELPERS
    // ==============================================================================

    async fn require(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .find_by_id(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::not_found(EntityKind::Appointment, appointment_id))
    }

    /// Re-reads under lock; the held buckets are only valid while the start
    /// day is still `day`.
    async fn require_unmoved(&self, appointment_id: Uuid, day: NaiveDate) -> Result<Appointment, AppointmentError> {
        let current = self.require(appointment_id).await?;
        if current.start_time.date_naive() != day {
            return Err(AppointmentError::Retryable(format!(
                "Appointment {} was moved concurrently",
                appointment_id
            )));
        }
        Ok(current)
    }

    /// Runs `work` under the booking timeout, retrying transient failures.
    async fn run_bounded<T, F, Fut>(&self, operation: &str, mut work: F) -> Result<T, AppointmentError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppointmentError>>,
    {
        let timeout = self.rules.booking_timeout;
        let max_attempts = self.rules.retry_attempts + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = match tokio::time::timeout(timeout, work()).await {
                Ok(result) => result,
                Err(_) => Err(AppointmentError::Timeout(timeout.as_millis() as u64)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!("{} attempt {}/{} failed: {}, retrying", operation, attempt, max_attempts, e);
                    tokio::time::sleep(StdDuration::from_millis(25 * attempt as u64)).await;
                }
                Err(e) if e.is_expected() => {
                    debug!("{} rejected: {}", operation, e);
                    return Err(e);
                }
                Err(e) => {
                    error!("{} failed after {} attempt(s): {}", operation, attempt, e);
                    return Err(e);
                }
            }
        }
    }
}
