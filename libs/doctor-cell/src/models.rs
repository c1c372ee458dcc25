// libs/doctor-cell/src/models.rs
use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ==============================================================================
// WEEKLY SCHEDULE MODELS
// ==============================================================================

/// One recurring weekly working window of a doctor.
///
/// A doctor has at most one entry per weekday; a day without an entry is a
/// day off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: u8, // 0 = Sunday, 1 = Monday, etc.
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl ScheduleEntry {
    pub fn new(
        doctor_id: Uuid,
        day_of_week: u8,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            day_of_week,
            start_time,
            end_time,
        }
    }

    /// Inclusive on both ends: a booking may start exactly at closing time.
    pub fn contains(&self, time_of_day: NaiveTime) -> bool {
        self.start_time <= time_of_day && time_of_day <= self.end_time
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleEntryRequest {
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Day index used by schedule entries, Sunday first.
pub fn day_of_week(weekday: Weekday) -> u8 {
    weekday.num_days_from_sunday() as u8
}

pub fn day_of_week_at(instant: DateTime<Utc>) -> u8 {
    day_of_week(instant.weekday())
}

pub fn day_name(day_of_week: u8) -> &'static str {
    match day_of_week {
        0 => "Sunday",
        1 => "Monday",
        2 => "Tuesday",
        3 => "Wednesday",
        4 => "Thursday",
        5 => "Friday",
        6 => "Saturday",
        _ => "Unknown",
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScheduleError {
    #[error("Invalid schedule range: {0}")]
    InvalidRange(String),

    #[error("Doctor {doctor_id} already has a schedule entry for day {day_of_week}")]
    Conflict { doctor_id: Uuid, day_of_week: u8 },

    #[error("Schedule entry {0} not found")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let entry = ScheduleEntry::new(Uuid::new_v4(), 1, t(9, 0), t(17, 0));
        assert!(entry.contains(t(9, 0)));
        assert!(entry.contains(t(17, 0)));
        assert!(entry.contains(t(12, 30)));
        assert!(!entry.contains(t(8, 59)));
        assert!(!entry.contains(t(17, 1)));
    }

    #[test]
    fn sunday_is_day_zero() {
        // 2025-06-01 was a Sunday, 2025-06-02 a Monday.
        assert_eq!(day_of_week_at(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()), 0);
        assert_eq!(day_of_week_at(Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap()), 1);
        assert_eq!(day_name(6), "Saturday");
    }

    #[test]
    fn conflict_message_names_the_day() {
        let err = ScheduleError::Conflict { doctor_id: Uuid::nil(), day_of_week: 2 };
        assert!(err.to_string().ends_with("day 2"));
    }
}
