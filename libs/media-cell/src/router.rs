use std::sync::Arc;

use axum::{
    Router,
    routing::post,
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn media_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/upload", post(handlers::upload_file))
        .route("/avatar", post(handlers::replace_avatar).delete(handlers::remove_avatar))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
