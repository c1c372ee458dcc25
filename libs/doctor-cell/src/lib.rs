pub mod handlers;
pub mod models;
pub mod repository;
pub mod router;
pub mod services;

pub use models::{CreateScheduleEntryRequest, ScheduleEntry, ScheduleError};
pub use repository::{InMemoryScheduleRepository, ScheduleRepository, SupabaseScheduleRepository};
pub use services::ScheduleCalendar;
