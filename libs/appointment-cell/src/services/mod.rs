pub mod availability;
pub mod lifecycle;
pub mod locks;
pub mod overlap;
pub mod query;
pub mod scheduler;

pub use availability::{AvailabilityChecker, AvailabilityVerdict};
pub use lifecycle::AppointmentLifecycle;
pub use locks::SlotLocks;
pub use query::{AppointmentFilter, AppointmentQuery, Criterion, Page, PageRequest};
pub use scheduler::{AppointmentScheduler, PurgeSummary};
