use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};

use auth_cell::RoleService;
use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{
    AddDoctorRequest, CreateHospitalRequest, TemplateUpload, UpdateHospitalRequest,
    UpdateTemplateTypeRequest,
};
use crate::services::{HospitalService, StaffService, TemplateService};

// ==============================================================================
// HOSPITALS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_hospital(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateHospitalRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    RoleService::new(&state)
        .require_role(&user.id, auth.token(), &[Role::SystemAdmin])
        .await?;

    let hospital = HospitalService::new(&state)
        .create_hospital(request, auth.token())
        .await?;

    Ok((StatusCode::CREATED, Json(json!(hospital))))
}

#[axum::debug_handler]
pub async fn list_hospitals(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let hospitals = HospitalService::new(&state).list_hospitals(auth.token()).await?;

    Ok(Json(json!({
        "hospitals": hospitals,
        "total": hospitals.len()
    })))
}

#[axum::debug_handler]
pub async fn get_hospital(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(hospital_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let hospital = HospitalService::new(&state)
        .get_hospital_with_templates(&hospital_id, auth.token())
        .await?;

    Ok(Json(json!(hospital)))
}

#[axum::debug_handler]
pub async fn update_hospital(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(hospital_id): Path<String>,
    Json(request): Json<UpdateHospitalRequest>,
) -> Result<Json<Value>, AppError> {
    RoleService::new(&state)
        .require_role(&user.id, auth.token(), &[Role::SystemAdmin])
        .await?;

    let hospital = HospitalService::new(&state)
        .update_hospital(&hospital_id, request, auth.token())
        .await?;

    Ok(Json(json!(hospital)))
}

// ==============================================================================
// TEMPLATES
// ==============================================================================

#[axum::debug_handler]
pub async fn list_templates(
    State(state): State<Arc<AppConfig>>,
    Path(hospital_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let templates = TemplateService::new(&state).list_templates(&hospital_id).await?;

    Ok(Json(json!({
        "templates": templates,
        "total": templates.len()
    })))
}

#[axum::debug_handler]
pub async fn upload_template(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(hospital_id): Path<String>,
    Json(upload): Json<TemplateUpload>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    RoleService::new(&state)
        .require_role(&user.id, auth.token(), &[Role::SystemAdmin])
        .await?;

    let result = TemplateService::new(&state)
        .upload_template(&hospital_id, upload)
        .await?;

    let status = if result.replaced { StatusCode::OK } else { StatusCode::CREATED };
    Ok((status, Json(json!({
        "url": result.url,
        "template": result.template,
        "message": "Template uploaded successfully"
    }))))
}

#[axum::debug_handler]
pub async fn update_template_type(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path((hospital_id, template_id)): Path<(String, String)>,
    Json(request): Json<UpdateTemplateTypeRequest>,
) -> Result<Json<Value>, AppError> {
    RoleService::new(&state)
        .require_role(&user.id, auth.token(), &[Role::SystemAdmin])
        .await?;

    let template = TemplateService::new(&state)
        .update_template_type(&hospital_id, &template_id, request.template_type)
        .await?;

    Ok(Json(json!(template)))
}

#[axum::debug_handler]
pub async fn delete_template(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path((hospital_id, template_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    RoleService::new(&state)
        .require_role(&user.id, auth.token(), &[Role::SystemAdmin])
        .await?;

    TemplateService::new(&state)
        .delete_template(&hospital_id, &template_id)
        .await?;

    Ok(Json(json!({ "message": "Template deleted successfully" })))
}

// ==============================================================================
// STAFF
// ==============================================================================

#[axum::debug_handler]
pub async fn add_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(hospital_id): Path<String>,
    Json(request): Json<AddDoctorRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    RoleService::new(&state)
        .require_role(&user.id, auth.token(), &[Role::HospitalAdmin])
        .await?;

    let doctor = StaffService::new(&state)
        .add_doctor(&hospital_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(doctor))))
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(hospital_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctors = StaffService::new(&state)
        .list_doctors(&hospital_id, auth.token())
        .await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}
