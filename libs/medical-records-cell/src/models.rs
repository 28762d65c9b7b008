use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use doctor_cell::models::DoctorError;
use shared_database::supabase::{eq, SupabaseError};
use shared_models::error::AppError;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    #[default]
    Consultation,
    Diagnosis,
    LabReport,
    Imaging,
    DischargeSummary,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub record_type: RecordType,
    pub title: String,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecordRequest {
    pub patient_id: String,
    #[serde(default)]
    pub record_type: RecordType,
    pub title: String,
    pub description: Option<String>,
    pub file_url: Option<String>,
}

impl CreateRecordRequest {
    pub fn validate(&self) -> Result<(), RecordsError> {
        if self.patient_id.trim().is_empty() {
            return Err(RecordsError::Validation("patient_id is required".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(RecordsError::Validation("title is required".to_string()));
        }
        if let Some(url) = &self.file_url {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(RecordsError::Validation("file_url must be an http(s) URL".to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: String,
    pub patient_id: String,
    pub doctor_id: String,
    pub medicine: String,
    pub dosage: Option<String>,
    pub duration: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Which of a patient's clinical rows the caller may read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordScope {
    /// The patient reading their own chart.
    Own,
    /// A linked doctor; only rows this doctor authored.
    AuthoredBy(String),
}

impl RecordScope {
    /// PostgREST filter for a patient's rows under this scope.
    pub fn filter(&self, patient_id: &str) -> String {
        match self {
            RecordScope::Own => format!("patient_id={}", eq(patient_id)),
            RecordScope::AuthoredBy(doctor_id) => {
                format!("patient_id={}&doctor_id={}", eq(patient_id), eq(doctor_id))
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum RecordsError {
    #[error("Medical record not found")]
    NotFound,

    #[error("Not allowed to view this patient's records")]
    AccessDenied,

    #[error("Only doctors can create medical records")]
    NotADoctor,

    #[error("Patient is not linked to this doctor")]
    NotLinked,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for RecordsError {
    fn from(err: anyhow::Error) -> Self {
        match SupabaseError::find(&err) {
            Some(SupabaseError::Auth(_)) => RecordsError::AccessDenied,
            _ => RecordsError::Database(err.to_string()),
        }
    }
}

impl From<DoctorError> for RecordsError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotADoctor => RecordsError::NotADoctor,
            DoctorError::NotLinked => RecordsError::NotLinked,
            DoctorError::PatientNotFound => RecordsError::Validation(err.to_string()),
            DoctorError::Validation(msg) => RecordsError::Validation(msg),
            DoctorError::Database(msg) => RecordsError::Database(msg),
        }
    }
}

impl From<RecordsError> for AppError {
    fn from(err: RecordsError) -> Self {
        match err {
            RecordsError::NotFound => AppError::NotFound(err.to_string()),
            RecordsError::AccessDenied
            | RecordsError::NotADoctor
            | RecordsError::NotLinked => AppError::Forbidden(err.to_string()),
            RecordsError::Validation(msg) => AppError::ValidationError(msg),
            RecordsError::Database(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn request() -> CreateRecordRequest {
        CreateRecordRequest {
            patient_id: "p1".to_string(),
            record_type: RecordType::LabReport,
            title: "CBC".to_string(),
            description: None,
            file_url: None,
        }
    }

    #[test]
    fn test_title_is_required() {
        assert!(request().validate().is_ok());

        let untitled = CreateRecordRequest { title: "   ".to_string(), ..request() };
        assert_matches!(untitled.validate(), Err(RecordsError::Validation(msg)) if msg.contains("title"));
    }

    #[test]
    fn test_file_url_must_be_http() {
        let bad = CreateRecordRequest { file_url: Some("ftp://x/y.pdf".to_string()), ..request() };
        assert_matches!(bad.validate(), Err(RecordsError::Validation(_)));
    }

    #[test]
    fn test_scope_filters() {
        assert_eq!(RecordScope::Own.filter("p1"), "patient_id=eq.p1");
        assert_eq!(
            RecordScope::AuthoredBy("d1".to_string()).filter("p1"),
            "patient_id=eq.p1&doctor_id=eq.d1"
        );
    }

    #[test]
    fn test_record_type_defaults_to_consultation() {
        let parsed: CreateRecordRequest = serde_json::from_value(serde_json::json!({
            "patient_id": "p1",
            "title": "Visit"
        })).unwrap();
        assert_eq!(parsed.record_type, RecordType::Consultation);
    }
}
