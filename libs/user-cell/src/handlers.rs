use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{UpdateUserRequest, UserError, UserLookupQuery};
use crate::services::UserService;

#[axum::debug_handler]
pub async fn get_user(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let profile = UserService::new(&config)
        .get_user(&user.id, &user_id, auth.token())
        .await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn lookup_user(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<UserLookupQuery>,
) -> Result<Json<Value>, AppError> {
    let user_id = query.user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or(UserError::MissingId)?;

    let profile = UserService::new(&config)
        .get_user(&user.id, &user_id, auth.token())
        .await?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn update_user(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    let profile = UserService::new(&config)
        .update_user(&user.id, &user_id, request, auth.token())
        .await?;

    Ok(Json(json!(profile)))
}
