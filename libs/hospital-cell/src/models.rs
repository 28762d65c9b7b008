use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use shared_database::cloudinary::MediaError;
use shared_database::supabase::SupabaseError;
use shared_models::error::AppError;

pub const DEFAULT_PLACEHOLDERS: [&str; 7] = [
    "dr_name",
    "patient_name",
    "medicine",
    "quantity",
    "timing",
    "signature",
    "qr_code_id",
];

static SLUG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug pattern compiles")
});

static NON_SLUG_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-z0-9]+").expect("separator pattern compiles")
});

// ==============================================================================
// HOSPITAL MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub pincode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hospital {
    pub id: String,
    pub name: String,
    pub slug: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub location: Option<Location>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Row shape used by hospital pickers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HospitalSummary {
    pub id: String,
    pub name: String,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HospitalWithTemplates {
    #[serde(flatten)]
    pub hospital: Hospital,
    pub templates: Vec<HospitalTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateHospitalRequest {
    pub name: String,
    pub slug: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub location: Option<Location>,
}

impl CreateHospitalRequest {
    /// Returns the slug to store: the provided one when well formed, otherwise
    /// one derived from the name.
    pub fn resolve_slug(&self) -> Result<String, HospitalError> {
        if self.name.trim().is_empty() {
            return Err(HospitalError::Validation("Hospital name is required".to_string()));
        }

        match self.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) if is_valid_slug(slug) => Ok(slug.to_string()),
            Some(slug) => Err(HospitalError::InvalidSlug(slug.to_string())),
            None => {
                let derived = slugify(&self.name);
                if derived.is_empty() {
                    return Err(HospitalError::InvalidSlug(self.name.clone()));
                }
                Ok(derived)
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateHospitalRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub location: Option<Location>,
}

impl UpdateHospitalRequest {
    /// Builds the PATCH body from the provided fields only.
    pub fn to_patch(&self) -> Result<Map<String, Value>, HospitalError> {
        let mut patch = Map::new();

        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(HospitalError::Validation("Hospital name cannot be empty".to_string()));
            }
            patch.insert("name".to_string(), json!(name.trim()));
        }
        if let Some(slug) = &self.slug {
            if !is_valid_slug(slug) {
                return Err(HospitalError::InvalidSlug(slug.clone()));
            }
            patch.insert("slug".to_string(), json!(slug));
        }
        if let Some(email) = &self.contact_email {
            patch.insert("contact_email".to_string(), json!(email));
        }
        if let Some(phone) = &self.contact_phone {
            patch.insert("contact_phone".to_string(), json!(phone));
        }
        if let Some(location) = &self.location {
            patch.insert("location".to_string(), json!(location));
        }

        if patch.is_empty() {
            return Err(HospitalError::Validation("No fields to update".to_string()));
        }

        Ok(patch)
    }
}

/// Lowercases, collapses every run of non-alphanumerics to one hyphen and
/// trims hyphens from both ends.
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    NON_SLUG_CHARS.replace_all(&lowered, "-").trim_matches('-').to_string()
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_PATTERN.is_match(slug)
}

// ==============================================================================
// TEMPLATE MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    #[default]
    Prescription,
    LabReport,
    DischargeSummary,
    Invoice,
    Certificate,
    Other,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::Prescription => "prescription",
            TemplateType::LabReport => "lab_report",
            TemplateType::DischargeSummary => "discharge_summary",
            TemplateType::Invoice => "invoice",
            TemplateType::Certificate => "certificate",
            TemplateType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HospitalTemplate {
    pub id: String,
    pub hospital_id: String,
    pub template_type: TemplateType,
    pub template_url: Option<String>,
    #[serde(default)]
    pub placeholders: Vec<String>,
}

/// Upload body for creating a template, or replacing one when `template_id`
/// is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateUpload {
    pub template_id: Option<String>,
    pub template_type: Option<TemplateType>,
    pub file_data: String,
    pub file_type: Option<String>,
    pub placeholders: Option<Vec<String>>,
}

impl TemplateUpload {
    pub fn placeholders_or_default(&self) -> Vec<String> {
        match &self.placeholders {
            Some(list) => list.clone(),
            None => DEFAULT_PLACEHOLDERS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTemplateTypeRequest {
    pub template_type: TemplateType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateUploadResult {
    pub url: String,
    pub template: HospitalTemplate,
    pub replaced: bool,
}

// ==============================================================================
// STAFF MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddDoctorRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub qualification: String,
    pub specialization: String,
    pub experience_years: Option<i32>,
}

impl AddDoctorRequest {
    pub fn validate(&self) -> Result<(), HospitalError> {
        let required = [
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("qualification", &self.qualification),
            ("specialization", &self.specialization),
        ];

        let missing: Vec<&str> = required.iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| *field)
            .collect();

        if !missing.is_empty() {
            return Err(HospitalError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        if !self.email.contains('@') {
            return Err(HospitalError::Validation("A valid email is required".to_string()));
        }

        if matches!(self.experience_years, Some(years) if years < 0) {
            return Err(HospitalError::Validation("experience_years cannot be negative".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionedDoctor {
    pub id: String,
    pub name: String,
    pub email: String,
    pub hospital_id: String,
    pub qualification: String,
    pub specialization: String,
    pub invited: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HospitalDoctor {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub qualification: Option<String>,
    pub specialization: Option<String>,
    pub rating: Option<f64>,
    pub experience_years: Option<i32>,
}

impl HospitalDoctor {
    /// Flattens a `doctors` row with an embedded `user` object.
    pub fn from_row(row: &Value) -> Option<Self> {
        let id = row.get("id")?.as_str()?.to_string();
        let user = row.get("user").filter(|u| u.is_object());
        let user_str = |key: &str| {
            user.and_then(|u| u.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Some(Self {
            id,
            name: user_str("name").unwrap_or_else(|| "Unnamed Doctor".to_string()),
            email: user_str("email"),
            phone: user_str("phone"),
            qualification: row.get("qualification").and_then(Value::as_str).map(str::to_string),
            specialization: row.get("specialization").and_then(Value::as_str).map(str::to_string),
            rating: row.get("rating").and_then(Value::as_f64),
            experience_years: row.get("experience_years")
                .and_then(Value::as_i64)
                .and_then(|v| i32::try_from(v).ok()),
        })
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum HospitalError {
    #[error("Hospital not found")]
    NotFound,

    #[error("Template not found")]
    TemplateNotFound,

    #[error("Invalid slug '{0}': use lowercase letters, digits and single hyphens")]
    InvalidSlug(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("A hospital or user with these details already exists")]
    AlreadyExists,

    #[error("{0}")]
    Media(#[from] MediaError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for HospitalError {
    fn from(err: anyhow::Error) -> Self {
        match SupabaseError::find(&err) {
            Some(SupabaseError::Conflict(_)) => HospitalError::AlreadyExists,
            _ => HospitalError::Database(err.to_string()),
        }
    }
}

impl From<HospitalError> for AppError {
    fn from(err: HospitalError) -> Self {
        match err {
            HospitalError::NotFound | HospitalError::TemplateNotFound => AppError::NotFound(err.to_string()),
            HospitalError::InvalidSlug(_) | HospitalError::Validation(_) => AppError::ValidationError(err.to_string()),
            HospitalError::AlreadyExists => AppError::Conflict(err.to_string()),
            HospitalError::Media(MediaError::InvalidPayload(msg)) => AppError::BadRequest(msg),
            HospitalError::Media(e) => AppError::ExternalService(e.to_string()),
            HospitalError::Database(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("City General Hospital"), "city-general-hospital");
        assert_eq!(slugify("  St. Mary's -- Clinic!! "), "st-mary-s-clinic");
        assert_eq!(slugify("Apollo 24x7"), "apollo-24x7");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("city-hospital"));
        assert!(is_valid_slug("h1"));
        assert!(!is_valid_slug("City-Hospital"));
        assert!(!is_valid_slug("city--hospital"));
        assert!(!is_valid_slug("-city"));
        assert!(!is_valid_slug("city hospital"));
    }

    #[test]
    fn test_resolve_slug() {
        let request = CreateHospitalRequest {
            name: "Sunrise Care Centre".to_string(),
            slug: None,
            contact_email: None,
            contact_phone: None,
            location: None,
        };
        assert_eq!(request.resolve_slug().unwrap(), "sunrise-care-centre");

        let explicit = CreateHospitalRequest { slug: Some("sunrise".to_string()), ..request.clone() };
        assert_eq!(explicit.resolve_slug().unwrap(), "sunrise");

        let bad = CreateHospitalRequest { slug: Some("Sun Rise".to_string()), ..request.clone() };
        assert_matches!(bad.resolve_slug(), Err(HospitalError::InvalidSlug(_)));

        let unnamed = CreateHospitalRequest { name: " ".to_string(), ..request };
        assert_matches!(unnamed.resolve_slug(), Err(HospitalError::Validation(_)));
    }

    #[test]
    fn test_update_patch_only_has_provided_fields() {
        let request = UpdateHospitalRequest {
            contact_phone: Some("+91 99999 00000".to_string()),
            ..Default::default()
        };
        let patch = request.to_patch().unwrap();
        assert_eq!(patch.len(), 1);
        assert_eq!(patch["contact_phone"], "+91 99999 00000");

        assert_matches!(UpdateHospitalRequest::default().to_patch(), Err(HospitalError::Validation(_)));
    }

    #[test]
    fn test_default_placeholders() {
        let upload = TemplateUpload {
            template_id: None,
            template_type: None,
            file_data: "aGVsbG8=".to_string(),
            file_type: None,
            placeholders: None,
        };
        let placeholders = upload.placeholders_or_default();
        assert_eq!(placeholders.len(), 7);
        assert_eq!(placeholders[0], "dr_name");
        assert_eq!(placeholders[6], "qr_code_id");
    }

    #[test]
    fn test_add_doctor_reports_missing_fields() {
        let request = AddDoctorRequest {
            name: "Dr. Rao".to_string(),
            email: "rao@hospital.com".to_string(),
            phone: "".to_string(),
            qualification: "MBBS".to_string(),
            specialization: " ".to_string(),
            experience_years: None,
        };

        match request.validate() {
            Err(HospitalError::Validation(msg)) => {
                assert!(msg.contains("phone"));
                assert!(msg.contains("specialization"));
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_hospital_doctor_from_row() {
        let row = json!({
            "id": "d1",
            "qualification": "MD",
            "specialization": "Neurology",
            "rating": 4.8,
            "experience_years": 12,
            "user": { "name": "Dr. Iyer", "email": "iyer@h.com", "phone": null }
        });
        let doctor = HospitalDoctor::from_row(&row).unwrap();
        assert_eq!(doctor.name, "Dr. Iyer");
        assert_eq!(doctor.experience_years, Some(12));
        assert_eq!(doctor.phone, None);

        let orphan = json!({ "id": "d2", "user": null });
        assert_eq!(HospitalDoctor::from_row(&orphan).unwrap().name, "Unnamed Doctor");
    }

    #[test]
    fn test_template_type_serde() {
        let parsed: TemplateType = serde_json::from_value(json!("discharge_summary")).unwrap();
        assert_eq!(parsed, TemplateType::DischargeSummary);
        assert_eq!(json!(TemplateType::LabReport), json!("lab_report"));
    }
}
