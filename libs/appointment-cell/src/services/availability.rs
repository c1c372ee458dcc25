// libs/appointment-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use doctor_cell::models::day_of_week_at;
use doctor_cell::ScheduleCalendar;

use crate::models::{Appointment, AppointmentError, SchedulingRules};
use crate::repository::AppointmentRepository;
use crate::services::overlap::conflicting_ids;

/// Outcome of an availability check, with the reason when negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "conflicts", rename_all = "snake_case")]
pub enum AvailabilityVerdict {
    Available,
    OutsideWorkingHours,
    RunsPastClosing,
    Conflicts(Vec<Uuid>),
}

impl AvailabilityVerdict {
    pub fn is_available(&self) -> bool {
        matches!(self, AvailabilityVerdict::Available)
    }

    pub fn describe(&self) -> String {
        match self {
            AvailabilityVerdict::Available => "slot is free".to_string(),
            AvailabilityVerdict::OutsideWorkingHours => "doctor is not working at that time".to_string(),
            AvailabilityVerdict::RunsPastClosing => "appointment would end after working hours".to_string(),
            AvailabilityVerdict::Conflicts(ids) => format!("overlaps {} existing appointment(s)", ids.len()),
        }
    }
}

/// UTC dates whose bookings can collide with `[start, end)`: the day before
/// the start (bookings running past midnight) through the day of the end.
pub fn days_to_scan(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<NaiveDate> {
    let first = start.date_naive() - Duration::days(1);
    let last = end.date_naive();

    first.iter_days().take_while(|day| *day <= last).collect()
}

/// Working hours AND no overlap with the doctor's slot-holding appointments.
pub struct AvailabilityChecker {
    calendar: Arc<ScheduleCalendar>,
    appointments: Arc<dyn AppointmentRepository>,
    rules: SchedulingRules,
}

impl AvailabilityChecker {
    pub fn new(
        calendar: Arc<ScheduleCalendar>,
        appointments: Arc<dyn AppointmentRepository>,
        rules: SchedulingRules,
    ) -> Self {
        Self { calendar, appointments, rules }
    }

    pub async fn is_available(
        &self,
        doctor_id: Uuid,
        proposed_start: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<bool, AppointmentError> {
        Ok(self
            .check(doctor_id, proposed_start, duration_minutes, None)
            .await?
            .is_available())
    }

    /// `exclude_appointment_id` skips one booking, the one being moved.
    pub async fn check(
        &self,
        doctor_id: Uuid,
        proposed_start: DateTime<Utc>,
        duration_minutes: i64,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<AvailabilityVerdict, AppointmentError> {
        let proposed_end = proposed_start + Duration::minutes(duration_minutes);

        if !self.calendar.is_within_working_hours(doctor_id, proposed_start).await? {
            debug!("Doctor {} not working at {}", doctor_id, proposed_start);
            return Ok(AvailabilityVerdict::OutsideWorkingHours);
        }

        if self.rules.require_end_within_hours {
            let window_end = self
                .calendar
                .entry_for(doctor_id, day_of_week_at(proposed_start))
                .await?
                .map(|entry| proposed_start.date_naive().and_time(entry.end_time).and_utc());

            if window_end.is_some_and(|end| proposed_end > end) {
                return Ok(AvailabilityVerdict::RunsPastClosing);
            }
        }

        let existing = self.bookings(doctor_id, &days_to_scan(proposed_start, proposed_end)).await?;
        let conflicts = conflicting_ids(proposed_start, proposed_end, &existing, exclude_appointment_id);

        if conflicts.is_empty() {
            Ok(AvailabilityVerdict::Available)
        } else {
            debug!(
                "Doctor {} slot {} - {} conflicts with {:?}",
                doctor_id, proposed_start, proposed_end, conflicts
            );
            Ok(AvailabilityVerdict::Conflicts(conflicts))
        }
    }

    /// First `limit` free starts inside the doctor's window on `date`,
    /// stepping by the slot granularity.
    pub async fn suggest_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        duration_minutes: i64,
        limit: usize,
    ) -> Result<Vec<DateTime<Utc>>, AppointmentError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let Some((window_start, window_end)) = self.calendar.working_window(doctor_id, date).await? else {
            return Ok(Vec::new());
        };

        let duration = Duration::minutes(duration_minutes);
        let step = Duration::minutes(self.rules.slot_granularity_minutes.max(1));
        let existing = self.bookings(doctor_id, &days_to_scan(window_start, window_end + duration)).await?;

        let mut slots = Vec::new();
        let mut candidate = window_start;

        while candidate <= window_end && slots.len() < limit {
            let end = candidate + duration;
            let fits = !self.rules.require_end_within_hours || end <= window_end;

            if fits && conflicting_ids(candidate, end, &existing, None).is_empty() {
                slots.push(candidate);
            }
            candidate += step;
        }

        debug!("Suggested {} slot(s) for doctor {} on {}", slots.len(), doctor_id, date);
        Ok(slots)
    }

    async fn bookings(&self, doctor_id: Uuid, days: &[NaiveDate]) -> Result<Vec<Appointment>, AppointmentError> {
        let per_day = try_join_all(
            days.iter()
                .map(|day| self.appointments.find_by_doctor_and_day(doctor_id, *day)),
        )
        .await?;

        Ok(per_day.into_iter().flatten().filter(Appointment::blocks_slot).collect())
    }
}
