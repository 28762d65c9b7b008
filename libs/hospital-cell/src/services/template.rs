use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::cloudinary::{CloudinaryClient, FilePayload, ResourceType};
use shared_database::supabase::{eq, SupabaseClient};

use crate::models::{
    HospitalError, HospitalTemplate, TemplateType, TemplateUpload, TemplateUploadResult,
};
use crate::services::hospital::first_row;

/// Template assets and their `hospital_templates` rows. Store writes run
/// with the service-role key once the caller has passed the role gate.
pub struct TemplateService {
    supabase: SupabaseClient,
    media: CloudinaryClient,
    service_key: String,
}

pub fn template_folder(hospital_id: &str) -> String {
    format!("hospital/{}/templates", hospital_id)
}

impl TemplateService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            media: CloudinaryClient::new(config),
            service_key: config.service_key().to_string(),
        }
    }

    pub async fn list_templates(&self, hospital_id: &str) -> Result<Vec<HospitalTemplate>, HospitalError> {
        let path = format!("/rest/v1/hospital_templates?hospital_id={}", eq(hospital_id));
        let templates: Vec<HospitalTemplate> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_key),
            None,
        ).await?;

        Ok(templates)
    }

    /// A template scoped to its hospital; a row owned by another hospital is
    /// reported as missing.
    pub async fn get_template(
        &self,
        hospital_id: &str,
        template_id: &str,
    ) -> Result<HospitalTemplate, HospitalError> {
        let path = format!(
            "/rest/v1/hospital_templates?id={}&hospital_id={}",
            eq(template_id), eq(hospital_id)
        );
        let row = self.supabase.select_one(&path, &self.service_key)
            .await?
            .ok_or(HospitalError::TemplateNotFound)?;

        serde_json::from_value(row).map_err(|e| HospitalError::Database(e.to_string()))
    }

    /// Uploads a template file. With `template_id` the previous asset is
    /// destroyed first and the existing row updated in place.
    pub async fn upload_template(
        &self,
        hospital_id: &str,
        upload: TemplateUpload,
    ) -> Result<TemplateUploadResult, HospitalError> {
        let payload = FilePayload::parse(&upload.file_data, upload.file_type.as_deref())?;
        let placeholders = upload.placeholders_or_default();

        let existing = match upload.template_id.as_deref() {
            Some(template_id) => Some(self.get_template(hospital_id, template_id).await?),
            None => {
                self.ensure_hospital_exists(hospital_id).await?;
                None
            }
        };

        if let Some(url) = existing.as_ref().and_then(|t| t.template_url.as_deref()) {
            debug!("Replacing template asset {}", url);
            self.media.destroy_by_url_best_effort(url).await;
        }

        let asset = self.media
            .upload(&payload, &template_folder(hospital_id), ResourceType::Auto)
            .await?;

        let template = match existing {
            Some(previous) => {
                let template_type = upload.template_type.unwrap_or(previous.template_type);
                let mut body = json!({
                    "template_type": template_type,
                    "template_url": asset.secure_url,
                });
                if upload.placeholders.is_some() {
                    body["placeholders"] = json!(placeholders);
                }

                let path = format!(
                    "/rest/v1/hospital_templates?id={}&hospital_id={}",
                    eq(&previous.id), eq(hospital_id)
                );
                let rows = self.supabase
                    .write_returning(Method::PATCH, &path, &self.service_key, body)
                    .await?;
                first_row::<HospitalTemplate>(rows)?.ok_or(HospitalError::TemplateNotFound)?
            }
            None => {
                let body = json!({
                    "hospital_id": hospital_id,
                    "template_type": upload.template_type.unwrap_or_default(),
                    "template_url": asset.secure_url,
                    "placeholders": placeholders,
                });
                let rows = self.supabase
                    .write_returning(Method::POST, "/rest/v1/hospital_templates", &self.service_key, body)
                    .await?;
                first_row::<HospitalTemplate>(rows)?
                    .ok_or_else(|| HospitalError::Database("Template insert returned no rows".to_string()))?
            }
        };

        let replaced = upload.template_id.is_some();
        info!("Template {} {} for hospital {}", template.id, if replaced { "replaced" } else { "created" }, hospital_id);

        Ok(TemplateUploadResult {
            url: asset.secure_url,
            template,
            replaced,
        })
    }

    /// Changes only the template's type; the stored asset is untouched.
    pub async fn update_template_type(
        &self,
        hospital_id: &str,
        template_id: &str,
        template_type: TemplateType,
    ) -> Result<HospitalTemplate, HospitalError> {
        debug!("Setting template {} type to {}", template_id, template_type.as_str());

        let path = format!(
            "/rest/v1/hospital_templates?id={}&hospital_id={}",
            eq(template_id), eq(hospital_id)
        );
        let rows = self.supabase
            .write_returning(Method::PATCH, &path, &self.service_key, json!({ "template_type": template_type }))
            .await?;

        first_row::<HospitalTemplate>(rows)?.ok_or(HospitalError::TemplateNotFound)
    }

    pub async fn delete_template(&self, hospital_id: &str, template_id: &str) -> Result<(), HospitalError> {
        let template = self.get_template(hospital_id, template_id).await?;

        match template.template_url.as_deref() {
            Some(url) => self.media.destroy_by_url_best_effort(url).await,
            None => warn!("Template {} has no stored asset", template_id),
        }

        let path = format!(
            "/rest/v1/hospital_templates?id={}&hospital_id={}",
            eq(template_id), eq(hospital_id)
        );
        let _: Value = self.supabase.request(
            Method::DELETE,
            &path,
            Some(&self.service_key),
            None,
        ).await?;

        info!("Template {} deleted from hospital {}", template_id, hospital_id);
        Ok(())
    }

    async fn ensure_hospital_exists(&self, hospital_id: &str) -> Result<(), HospitalError> {
        let path = format!("/rest/v1/hospitals?id={}&select=id", eq(hospital_id));
        self.supabase.select_one(&path, &self.service_key)
            .await?
            .map(|_| ())
            .ok_or(HospitalError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_folder() {
        assert_eq!(template_folder("h-42"), "hospital/h-42/templates");
    }
}
