use axum::{routing::get, Router};

use appointment_cell::handlers::AppointmentState;
use appointment_cell::router::{appointment_routes, doctor_cleanup_routes};
use doctor_cell::handlers::ScheduleState;
use doctor_cell::router::schedule_routes;

pub fn create_router(appointments: AppointmentState, schedules: ScheduleState) -> Router {
    Router::new()
        .route("/", get(|| async { "Vet Clinic scheduling API is running!" }))
        .nest("/appointments", appointment_routes(appointments.clone()))
        .nest(
            "/doctors",
            schedule_routes(schedules).merge(doctor_cleanup_routes(appointments)),
        )
}
