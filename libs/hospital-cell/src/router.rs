use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn hospital_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_hospitals).post(handlers::create_hospital))
        .route("/{hospital_id}", get(handlers::get_hospital).put(handlers::update_hospital))
        .route(
            "/{hospital_id}/templates",
            get(handlers::list_templates).post(handlers::upload_template),
        )
        .route(
            "/{hospital_id}/templates/{template_id}",
            patch(handlers::update_template_type).delete(handlers::delete_template),
        )
        .route(
            "/{hospital_id}/doctors",
            get(handlers::list_doctors).post(handlers::add_doctor),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
