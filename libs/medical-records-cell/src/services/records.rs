use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::{eq, SupabaseClient};

use crate::models::{CreateRecordRequest, MedicalRecord, RecordsError};
use crate::services::AccessService;

pub struct RecordService {
    supabase: SupabaseClient,
    access: AccessService,
}

impl RecordService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            access: AccessService::new(config),
        }
    }

    pub async fn create_record(
        &self,
        doctor_id: &str,
        request: CreateRecordRequest,
        auth_token: &str,
    ) -> Result<MedicalRecord, RecordsError> {
        request.validate()?;
        self.access.require_linked_doctor(doctor_id, &request.patient_id, auth_token).await?;

        debug!("Creating {:?} record for patient {}", request.record_type, request.patient_id);

        let mut rows = self.supabase.write_returning(
            Method::POST,
            "/rest/v1/medical_records",
            auth_token,
            json!({
                "patient_id": request.patient_id,
                "doctor_id": doctor_id,
                "record_type": request.record_type,
                "title": request.title.trim(),
                "description": request.description,
                "file_url": request.file_url,
            }),
        ).await?;

        if rows.is_empty() {
            return Err(RecordsError::Database("Record insert returned no rows".to_string()));
        }

        let record: MedicalRecord = serde_json::from_value(rows.swap_remove(0))
            .map_err(|e| RecordsError::Database(e.to_string()))?;

        info!("Medical record {} created by doctor {}", record.id, doctor_id);
        Ok(record)
    }

    pub async fn list_records(
        &self,
        caller_id: &str,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Vec<MedicalRecord>, RecordsError> {
        let scope = self.access.resolve_scope(caller_id, patient_id, auth_token).await?;

        let path = format!(
            "/rest/v1/medical_records?{}&order=created_at.desc",
            scope.filter(patient_id)
        );
        let records: Vec<MedicalRecord> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(records)
    }

    /// A single record, visible to its author and to the patient it is about.
    pub async fn get_record(
        &self,
        record_id: &str,
        caller_id: &str,
        auth_token: &str,
    ) -> Result<MedicalRecord, RecordsError> {
        let path = format!("/rest/v1/medical_records?id={}", eq(record_id));
        let row = self.supabase.select_one(&path, auth_token)
            .await?
            .ok_or(RecordsError::NotFound)?;

        let record: MedicalRecord = serde_json::from_value(row)
            .map_err(|e| RecordsError::Database(e.to_string()))?;

        if record.doctor_id != caller_id && record.patient_id != caller_id {
            return Err(RecordsError::AccessDenied);
        }

        Ok(record)
    }
}
