// libs/appointment-cell/src/router.rs
use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentState};

pub fn appointment_routes(state: AppointmentState) -> Router {
    // All appointment operations require authentication
    Router::new()
        .route("/", post(handlers::create_appointment).get(handlers::search_appointments))
        .route("/availability", get(handlers::check_availability))
        .route("/suggestions", get(handlers::suggest_slots))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment).delete(handlers::delete_appointment),
        )
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/{appointment_id}/approve", post(handlers::approve_appointment))
        .route("/{appointment_id}/reject", post(handlers::reject_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}

/// Admin cascade, mounted under `/doctors` next to the schedule routes.
pub fn doctor_cleanup_routes(state: AppointmentState) -> Router {
    Router::new()
        .route("/{doctor_id}/appointments", delete(handlers::purge_doctor))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
