use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use shared_database::supabase::SupabaseError;
use shared_models::error::AppError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const PATIENT_SEARCH_LIMIT: u32 = 5;
pub const UNNAMED_PATIENT: &str = "Unnamed Patient";

// ==============================================================================
// DOCTOR MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorHospital {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: String,
    pub hospital_id: Option<String>,
    pub qualification: Option<String>,
    pub specialization: Option<String>,
    pub rating: Option<f64>,
    pub experience_years: Option<i32>,
    #[serde(default)]
    pub user: Option<DoctorUser>,
    #[serde(default)]
    pub hospital: Option<DoctorHospital>,
}

/// Counters shown on the doctor dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DoctorOverview {
    pub linked_patients: usize,
    pub todays_appointments: usize,
    pub upcoming_appointments: usize,
}

// ==============================================================================
// PATIENT LINKAGE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientMatch {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkOutcome {
    pub linked: bool,
    pub already_linked: bool,
    pub patient_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedPatient {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub blood_group: Option<String>,
    pub dob: Option<NaiveDate>,
    pub age: Option<u32>,
    pub avatar_url: Option<String>,
    pub linked_at: Option<DateTime<Utc>>,
}

impl LinkedPatient {
    /// Builds a row from a `doctor_patient` record with an embedded `patient`.
    pub fn from_link_row(row: &Value, today: NaiveDate) -> Option<Self> {
        let patient = row.get("patient").filter(|p| p.is_object())?;
        let text = |key: &str| patient.get(key).and_then(Value::as_str).map(str::to_string);

        let dob = text("dob").and_then(|raw| parse_dob(&raw));

        Some(Self {
            id: text("id")?,
            name: text("name")
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| UNNAMED_PATIENT.to_string()),
            email: text("email"),
            phone: text("phone"),
            gender: text("gender"),
            blood_group: text("blood_group"),
            dob,
            age: dob.and_then(|d| age_on(d, today)),
            avatar_url: text("avatar_url"),
            linked_at: row.get("created_at")
                .and_then(Value::as_str)
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }
}

/// Everything a linked doctor sees on a patient's chart. Clinical rows are
/// restricted to the ones the doctor authored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientChart {
    pub patient: Value,
    pub age: Option<u32>,
    pub appointments: Vec<Value>,
    pub medical_records: Vec<Value>,
    pub prescriptions: Vec<Value>,
}

/// Inclusive row window, `from=0&to=19` by default.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRange {
    pub from: Option<u32>,
    pub to: Option<u32>,
}

impl PageRange {
    /// Returns `(offset, limit)` for PostgREST.
    pub fn to_offset_limit(&self) -> Result<(u32, u32), DoctorError> {
        let from = self.from.unwrap_or(0);
        let to = self.to.unwrap_or_else(|| from.saturating_add(DEFAULT_PAGE_SIZE - 1));

        let span = to.checked_sub(from)
            .ok_or_else(|| DoctorError::Validation(format!("Invalid range {}..{}", from, to)))?;

        let limit = span.saturating_add(1).min(MAX_PAGE_SIZE);
        Ok((from, limit))
    }
}

pub fn parse_dob(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Whole years between `dob` and `today`; `None` for a future birth date.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> Option<u32> {
    if dob > today {
        return None;
    }

    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }

    u32::try_from(years).ok()
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Doctor profile not found for this account")]
    NotADoctor,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Patient is not linked to this doctor")]
    NotLinked,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for DoctorError {
    fn from(err: anyhow::Error) -> Self {
        match SupabaseError::find(&err) {
            Some(SupabaseError::Auth(msg)) => DoctorError::Database(format!("access denied by store: {}", msg)),
            _ => DoctorError::Database(err.to_string()),
        }
    }
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotADoctor => AppError::Forbidden(err.to_string()),
            DoctorError::PatientNotFound => AppError::NotFound(err.to_string()),
            DoctorError::NotLinked => AppError::Forbidden(err.to_string()),
            DoctorError::Validation(msg) => AppError::ValidationError(msg),
            DoctorError::Database(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_before_and_after_birthday() {
        let dob = date(1990, 6, 15);
        assert_eq!(age_on(dob, date(2024, 6, 14)), Some(33));
        assert_eq!(age_on(dob, date(2024, 6, 15)), Some(34));
        assert_eq!(age_on(dob, date(1990, 6, 15)), Some(0));
        assert_eq!(age_on(dob, date(1989, 1, 1)), None);
    }

    #[test]
    fn test_age_leap_day() {
        let dob = date(2000, 2, 29);
        assert_eq!(age_on(dob, date(2023, 2, 28)), Some(22));
        assert_eq!(age_on(dob, date(2023, 3, 1)), Some(23));
    }

    #[test]
    fn test_parse_dob_accepts_timestamps() {
        assert_eq!(parse_dob("1990-01-01"), Some(date(1990, 1, 1)));
        assert_eq!(parse_dob("1990-01-01T00:00:00Z"), Some(date(1990, 1, 1)));
        assert_eq!(parse_dob("01/01/1990"), None);
    }

    #[test]
    fn test_page_range_defaults() {
        let range = PageRange { from: None, to: None };
        assert_eq!(range.to_offset_limit().unwrap(), (0, 20));

        let range = PageRange { from: Some(20), to: Some(39) };
        assert_eq!(range.to_offset_limit().unwrap(), (20, 20));

        let huge = PageRange { from: Some(0), to: Some(10_000) };
        assert_eq!(huge.to_offset_limit().unwrap(), (0, MAX_PAGE_SIZE));

        let reversed = PageRange { from: Some(10), to: Some(2) };
        assert_matches!(reversed.to_offset_limit(), Err(DoctorError::Validation(_)));
    }

    #[test]
    fn test_page_range_at_u32_bounds() {
        let tail = PageRange { from: Some(u32::MAX), to: None };
        assert_eq!(tail.to_offset_limit().unwrap(), (u32::MAX, 1));

        let everything = PageRange { from: Some(0), to: Some(u32::MAX) };
        assert_eq!(everything.to_offset_limit().unwrap(), (0, MAX_PAGE_SIZE));

        let near_end = PageRange { from: Some(u32::MAX - 5), to: None };
        assert_eq!(near_end.to_offset_limit().unwrap(), (u32::MAX - 5, 6));

        let reversed = PageRange { from: Some(u32::MAX), to: Some(0) };
        assert_matches!(reversed.to_offset_limit(), Err(DoctorError::Validation(_)));
    }

    #[test]
    fn test_linked_patient_defaults() {
        let row = json!({
            "created_at": "2024-03-01T10:00:00Z",
            "patient": {
                "id": "p1",
                "name": null,
                "email": "p1@example.com",
                "dob": "2000-05-20"
            }
        });

        let patient = LinkedPatient::from_link_row(&row, date(2024, 5, 19)).unwrap();
        assert_eq!(patient.name, UNNAMED_PATIENT);
        assert_eq!(patient.age, Some(23));
        assert!(patient.linked_at.is_some());

        let dangling = json!({ "patient": null });
        assert!(LinkedPatient::from_link_row(&dangling, date(2024, 1, 1)).is_none());
    }

    #[test]
    fn test_not_linked_maps_to_forbidden() {
        let err: AppError = DoctorError::NotLinked.into();
        assert_matches!(err, AppError::Forbidden(_));
    }
}
