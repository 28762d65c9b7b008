use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::PageRange;
use crate::services::{DoctorService, LinkageService};

#[derive(Debug, Deserialize)]
pub struct PatientSearchQuery {
    #[serde(default)]
    pub email: String,
}

#[axum::debug_handler]
pub async fn get_my_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&state).get_doctor(&user.id, auth.token()).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_overview(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);
    doctor_service.require_doctor(&user.id, auth.token()).await?;

    let overview = doctor_service.overview(&user.id, auth.token()).await?;

    Ok(Json(json!(overview)))
}

#[axum::debug_handler]
pub async fn search_patients(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    DoctorService::new(&state).require_doctor(&user.id, auth.token()).await?;

    let patients = LinkageService::new(&state)
        .search_patients(&query.email, auth.token())
        .await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn link_patient(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    DoctorService::new(&state).require_doctor(&user.id, auth.token()).await?;

    let outcome = LinkageService::new(&state)
        .link_patient(&user.id, &patient_id, auth.token())
        .await?;

    let status = if outcome.linked { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(json!(outcome))))
}

#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(range): Query<PageRange>,
) -> Result<Json<Value>, AppError> {
    DoctorService::new(&state).require_doctor(&user.id, auth.token()).await?;

    let patients = LinkageService::new(&state)
        .list_patients(&user.id, range, auth.token())
        .await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn get_patient_chart(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    DoctorService::new(&state).require_doctor(&user.id, auth.token()).await?;

    let chart = LinkageService::new(&state)
        .patient_chart(&user.id, &patient_id, auth.token())
        .await?;

    Ok(Json(json!(chart)))
}
