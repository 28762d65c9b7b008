use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::MediaUpload;
use crate::services::AvatarService;

#[axum::debug_handler]
pub async fn upload_file(
    State(state): State<Arc<AppConfig>>,
    Json(upload): Json<MediaUpload>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let result = AvatarService::new(&state).upload_file(upload).await?;

    Ok((StatusCode::CREATED, Json(json!(result))))
}

#[axum::debug_handler]
pub async fn replace_avatar(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(upload): Json<MediaUpload>,
) -> Result<Json<Value>, AppError> {
    let result = AvatarService::new(&state)
        .replace_avatar(&user.id, upload, auth.token())
        .await?;

    Ok(Json(json!(result)))
}

#[axum::debug_handler]
pub async fn remove_avatar(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let result = AvatarService::new(&state)
        .remove_avatar(&user.id, auth.token())
        .await?;

    Ok(Json(json!(result)))
}
