// libs/doctor-cell/src/services/calendar.rs
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{day_name, day_of_week, day_of_week_at, ScheduleEntry, ScheduleError};
use crate::repository::ScheduleRepository;

/// Weekly working hours of every doctor.
///
/// Times of day are interpreted in UTC, the same zone appointments are
/// stored in.
pub struct ScheduleCalendar {
    repository: Arc<dyn ScheduleRepository>,
}

impl ScheduleCalendar {
    pub fn new(repository: Arc<dyn ScheduleRepository>) -> Self {
        Self { repository }
    }

    /// True iff the doctor works on the instant's weekday and the instant's
    /// time of day lies inside that day's window (bounds included).
    ///
    /// Only the start instant is checked; the caller decides whether the
    /// whole appointment has to fit.
    pub async fn is_within_working_hours(
        &self,
        doctor_id: Uuid,
        instant: DateTime<Utc>,
    ) -> Result<bool, ScheduleError> {
        let day = day_of_week_at(instant);

        let Some(entry) = self.repository.find_entry(doctor_id, day).await? else {
            debug!("Doctor {} has no working hours on {}", doctor_id, day_name(day));
            return Ok(false);
        };

        Ok(entry.contains(instant.time()))
    }

    pub async fn entry_for(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
    ) -> Result<Option<ScheduleEntry>, ScheduleError> {
        self.repository.find_entry(doctor_id, day_of_week).await
    }

    /// The doctor's working window on a calendar date as absolute instants.
    pub async fn working_window(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, ScheduleError> {
        let entry = self.repository.find_entry(doctor_id, day_of_week(date.weekday())).await?;

        Ok(entry.map(|e| (
            date.and_time(e.start_time).and_utc(),
            date.and_time(e.end_time).and_utc(),
        )))
    }

    pub async fn entry_by_id(
        &self,
        schedule_id: Uuid,
    ) -> Result<Option<ScheduleEntry>, ScheduleError> {
        self.repository.find_by_id(schedule_id).await
    }

    pub async fn entries_for_doctor(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<ScheduleEntry>, ScheduleError> {
        self.repository.list_for_doctor(doctor_id).await
    }

    pub async fn add_entry(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<ScheduleEntry, ScheduleError> {
        debug!("Adding schedule entry for doctor {} on day {}", doctor_id, day_of_week);

        if day_of_week > 6 {
            return Err(ScheduleError::InvalidRange(
                "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
            ));
        }

        if start_time >= end_time {
            return Err(ScheduleError::InvalidRange(format!(
                "Start time {} must be before end time {}",
                start_time, end_time
            )));
        }

        if self.repository.find_entry(doctor_id, day_of_week).await?.is_some() {
            return Err(ScheduleError::Conflict { doctor_id, day_of_week });
        }

        // Uniqueness is enforced again by the repository insert.
        let entry = self
            .repository
            .insert(ScheduleEntry::new(doctor_id, day_of_week, start_time, end_time))
            .await?;

        info!(
            "Doctor {} now works {} {}-{}",
            doctor_id,
            day_name(day_of_week),
            start_time,
            end_time
        );
        Ok(entry)
    }

    pub async fn remove_entry(&self, schedule_id: Uuid) -> Result<(), ScheduleError> {
        if !self.repository.delete(schedule_id).await? {
            return Err(ScheduleError::NotFound(schedule_id));
        }

        info!("Schedule entry {} removed", schedule_id);
        Ok(())
    }

    /// Drops every entry of a doctor that is being removed from the system.
    pub async fn purge_doctor(&self, doctor_id: Uuid) -> Result<u64, ScheduleError> {
        let removed = self.repository.delete_by_doctor(doctor_id).await?;
        info!("Removed {} schedule entries of doctor {}", removed, doctor_id);
        Ok(removed)
    }
}
