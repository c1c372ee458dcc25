use axum::{
    middleware,
    routing::{delete, get},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, ScheduleState};

pub fn schedule_routes(state: ScheduleState) -> Router {
    Router::new()
        .route(
            "/{doctor_id}/schedule",
            get(handlers::get_doctor_schedule).post(handlers::create_schedule_entry),
        )
        .route("/{doctor_id}/schedule/{schedule_id}", delete(handlers::delete_schedule_entry))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
