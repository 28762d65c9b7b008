use std::sync::Arc;

use axum::{
    Router,
    routing::get,
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/me", get(handlers::get_my_profile))
        .route("/me/overview", get(handlers::get_overview))
        .route("/patients", get(handlers::list_patients))
        .route("/patients/search", get(handlers::search_patients))
        .route(
            "/patients/{patient_id}",
            get(handlers::get_patient_chart).post(handlers::link_patient),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
