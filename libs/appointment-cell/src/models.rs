use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use doctor_cell::models::{age_on, parse_dob, DoctorError, UNNAMED_PATIENT};
use shared_database::supabase::SupabaseError;
use shared_models::error::AppError;

pub const UNKNOWN_EMAIL: &str = "Unknown Email";
pub const UNKNOWN_PHONE: &str = "Unknown Phone";
pub const UNKNOWN_HOSPITAL: &str = "Unknown Hospital";

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub hospital_id: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: String,
    pub hospital_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl CreateAppointmentRequest {
    pub fn validate(&self) -> Result<(), AppointmentError> {
        if self.patient_id.trim().is_empty() {
            return Err(AppointmentError::ValidationError("patient_id is required".to_string()));
        }
        if self.hospital_id.trim().is_empty() {
            return Err(AppointmentError::ValidationError("hospital_id is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AppointmentRange {
    pub from: Option<u32>,
    pub to: Option<u32>,
}

// ==============================================================================
// VIEW MODELS
// ==============================================================================

/// Flattened appointment row for the doctor's appointment table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSummary {
    pub id: String,
    pub patient_id: Option<String>,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: String,
    pub patient_age: Option<u32>,
    pub hospital_name: String,
    pub hospital_location: Option<Value>,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

impl AppointmentSummary {
    /// Builds a summary from an `appointments` row with embedded `patient`
    /// and `hospital` objects. Rows without an id or a parseable schedule are
    /// skipped.
    pub fn from_row(row: &Value, today: NaiveDate) -> Option<Self> {
        let text = |obj: Option<&Value>, key: &str| {
            obj.and_then(|o| o.get(key))
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };

        let patient = row.get("patient").filter(|p| p.is_object());
        let hospital = row.get("hospital").filter(|h| h.is_object());

        let scheduled_at = row.get("scheduled_at")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())?
            .with_timezone(&Utc);

        let status = row.get("status")
            .cloned()
            .and_then(|s| serde_json::from_value::<AppointmentStatus>(s).ok())?;

        Some(Self {
            id: text(Some(row), "id")?,
            patient_id: text(patient, "id"),
            patient_name: text(patient, "name").unwrap_or_else(|| UNNAMED_PATIENT.to_string()),
            patient_email: text(patient, "email").unwrap_or_else(|| UNKNOWN_EMAIL.to_string()),
            patient_phone: text(patient, "phone").unwrap_or_else(|| UNKNOWN_PHONE.to_string()),
            patient_age: text(patient, "dob")
                .and_then(|raw| parse_dob(&raw))
                .and_then(|dob| age_on(dob, today)),
            hospital_name: text(hospital, "name").unwrap_or_else(|| UNKNOWN_HOSPITAL.to_string()),
            hospital_location: hospital
                .and_then(|h| h.get("location"))
                .filter(|l| !l.is_null())
                .cloned(),
            scheduled_at,
            status,
            notes: row.get("notes").and_then(Value::as_str).map(str::to_string),
        })
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Only doctors can manage appointments")]
    NotADoctor,

    #[error("Patient is not linked to this doctor")]
    PatientNotLinked,

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Appointment status changed concurrently")]
    StatusConflict,

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for AppointmentError {
    fn from(err: anyhow::Error) -> Self {
        match SupabaseError::find(&err) {
            Some(SupabaseError::Auth(_)) => AppointmentError::Unauthorized,
            _ => AppointmentError::DatabaseError(err.to_string()),
        }
    }
}

impl From<DoctorError> for AppointmentError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotADoctor => AppointmentError::NotADoctor,
            DoctorError::NotLinked => AppointmentError::PatientNotLinked,
            DoctorError::PatientNotFound => AppointmentError::ValidationError(err.to_string()),
            DoctorError::Validation(msg) => AppointmentError::ValidationError(msg),
            DoctorError::Database(msg) => AppointmentError::DatabaseError(msg),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound => AppError::NotFound(err.to_string()),
            AppointmentError::NotADoctor
            | AppointmentError::PatientNotLinked
            | AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
            AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::StatusConflict => AppError::Conflict(err.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
