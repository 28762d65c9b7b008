use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::{eq, SupabaseClient};

use crate::models::{
    CreateHospitalRequest, Hospital, HospitalError, HospitalSummary, HospitalTemplate,
    HospitalWithTemplates, UpdateHospitalRequest,
};

pub struct HospitalService {
    supabase: SupabaseClient,
}

impl HospitalService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_hospital(
        &self,
        request: CreateHospitalRequest,
        auth_token: &str,
    ) -> Result<Hospital, HospitalError> {
        let slug = request.resolve_slug()?;
        debug!("Creating hospital {} ({})", request.name, slug);

        let body = json!({
            "name": request.name.trim(),
            "slug": slug,
            "contact_email": request.contact_email,
            "contact_phone": request.contact_phone,
            "location": request.location.unwrap_or_default(),
        });

        let rows = self.supabase
            .write_returning(Method::POST, "/rest/v1/hospitals", auth_token, body)
            .await?;

        let hospital = first_row::<Hospital>(rows)?
            .ok_or_else(|| HospitalError::Database("Hospital insert returned no rows".to_string()))?;

        info!("Hospital created: {}", hospital.id);
        Ok(hospital)
    }

    pub async fn list_hospitals(&self, auth_token: &str) -> Result<Vec<HospitalSummary>, HospitalError> {
        debug!("Listing hospitals");

        let rows: Vec<HospitalSummary> = self.supabase.request(
            Method::GET,
            "/rest/v1/hospitals?select=id,name,location&order=name.asc",
            Some(auth_token),
            None,
        ).await?;

        Ok(rows)
    }

    /// Hospital plus its templates, in one embedded select.
    pub async fn get_hospital_with_templates(
        &self,
        hospital_id: &str,
        auth_token: &str,
    ) -> Result<HospitalWithTemplates, HospitalError> {
        debug!("Fetching hospital: {}", hospital_id);

        let path = format!(
            "/rest/v1/hospitals?id={}&select=*,templates:hospital_templates(*)",
            eq(hospital_id)
        );
        let mut row = self.supabase.select_one(&path, auth_token)
            .await?
            .ok_or(HospitalError::NotFound)?;

        let templates = match row.get_mut("templates").map(Value::take) {
            Some(Value::Null) | None => Vec::new(),
            Some(list) => serde_json::from_value::<Vec<HospitalTemplate>>(list)
                .map_err(|e| HospitalError::Database(e.to_string()))?,
        };

        let hospital: Hospital = serde_json::from_value(row)
            .map_err(|e| HospitalError::Database(e.to_string()))?;

        Ok(HospitalWithTemplates { hospital, templates })
    }

    pub async fn update_hospital(
        &self,
        hospital_id: &str,
        request: UpdateHospitalRequest,
        auth_token: &str,
    ) -> Result<Hospital, HospitalError> {
        let patch = request.to_patch()?;
        debug!("Updating hospital {} fields {:?}", hospital_id, patch.keys().collect::<Vec<_>>());

        let path = format!("/rest/v1/hospitals?id={}", eq(hospital_id));
        let rows = self.supabase
            .write_returning(Method::PATCH, &path, auth_token, Value::Object(patch))
            .await?;

        let hospital = first_row::<Hospital>(rows)?.ok_or(HospitalError::NotFound)?;

        info!("Hospital updated: {}", hospital.id);
        Ok(hospital)
    }
}

pub(crate) fn first_row<T: serde::de::DeserializeOwned>(
    mut rows: Vec<Value>,
) -> Result<Option<T>, HospitalError> {
    if rows.is_empty() {
        return Ok(None);
    }

    serde_json::from_value(rows.swap_remove(0))
        .map(Some)
        .map_err(|e| HospitalError::Database(e.to_string()))
}
