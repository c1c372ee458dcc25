pub mod directory;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod router;
pub mod services;
pub mod supabase;

pub use directory::{EntityDirectory, InMemoryDirectory, SupabaseDirectory};
pub use models::{
    Actor, ActorRole, Appointment, AppointmentDetails, AppointmentError, AppointmentStatus,
    CreateAppointmentRequest, LifecycleEvent, RescheduleAppointmentRequest, SchedulingRules,
};
pub use repository::{AppointmentRepository, InMemoryAppointmentRepository};
pub use services::{AppointmentQuery, AppointmentScheduler, AvailabilityChecker};
pub use supabase::SupabaseAppointmentRepository;
