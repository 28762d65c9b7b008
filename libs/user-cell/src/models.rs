use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use auth_cell::models::RoleError;
use doctor_cell::models::DoctorError;
use shared_database::supabase::SupabaseError;
use shared_models::auth::Role;
use shared_models::error::AppError;

pub const BLOOD_GROUPS: [&str; 8] = ["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub gender: Option<String>,
    pub dob: Option<NaiveDate>,
    pub blood_group: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Editable profile fields. Identity, email and role are fixed at creation
/// and are not accepted here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub dob: Option<NaiveDate>,
    pub blood_group: Option<String>,
}

impl UpdateUserRequest {
    pub fn to_patch(&self) -> Result<Value, UserError> {
        let mut patch = Map::new();

        if let Some(name) = &self.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(UserError::Validation("name cannot be blank".to_string()));
            }
            patch.insert("name".to_string(), json!(name));
        }
        if let Some(phone) = &self.phone {
            patch.insert("phone".to_string(), json!(phone.trim()));
        }
        if let Some(gender) = &self.gender {
            patch.insert("gender".to_string(), json!(gender.trim().to_lowercase()));
        }
        if let Some(dob) = self.dob {
            if dob > Utc::now().date_naive() {
                return Err(UserError::Validation("dob cannot be in the future".to_string()));
            }
            patch.insert("dob".to_string(), json!(dob));
        }
        if let Some(blood_group) = &self.blood_group {
            let blood_group = blood_group.trim().to_uppercase();
            if !BLOOD_GROUPS.contains(&blood_group.as_str()) {
                return Err(UserError::Validation(format!("Unknown blood group {}", blood_group)));
            }
            patch.insert("blood_group".to_string(), json!(blood_group));
        }

        if patch.is_empty() {
            return Err(UserError::Validation("No updatable fields supplied".to_string()));
        }

        Ok(Value::Object(patch))
    }
}

/// `?userId=` (or `?id=`) lookup form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserLookupQuery {
    #[serde(rename = "userId", alias = "id")]
    pub user_id: Option<String>,
}

#[derive(Error, Debug)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("Missing userId")]
    MissingId,

    #[error("Not allowed to access this user")]
    AccessDenied,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Role(#[from] RoleError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        match SupabaseError::find(&err) {
            Some(SupabaseError::Auth(_)) => UserError::AccessDenied,
            _ => UserError::Database(err.to_string()),
        }
    }
}

impl From<DoctorError> for UserError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotADoctor | DoctorError::NotLinked => UserError::AccessDenied,
            DoctorError::PatientNotFound => UserError::NotFound,
            DoctorError::Validation(msg) => UserError::Validation(msg),
            DoctorError::Database(msg) => UserError::Database(msg),
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => AppError::NotFound(err.to_string()),
            UserError::MissingId => AppError::BadRequest(err.to_string()),
            UserError::AccessDenied => AppError::Forbidden(err.to_string()),
            UserError::Validation(msg) => AppError::ValidationError(msg),
            UserError::Role(e) => e.into(),
            UserError::Database(msg) => AppError::Database(msg),
        }
    }
}
