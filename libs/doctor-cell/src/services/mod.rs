pub mod calendar;

pub use calendar::ScheduleCalendar;
