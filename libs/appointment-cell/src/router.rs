use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use shared_config::AppConfig;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // Bearer tokens are optional and passed through to the hospital backend.
    Router::new()
        .route("/", get(handlers::list_appointments))
        .route("/doctors/{doctor_id}/available-slots", get(handlers::get_available_slots))
        .route("/slots/compute", post(handlers::compute_slots))
        .with_state(state)
}
