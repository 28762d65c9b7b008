use reqwest::Method;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Prescription, RecordsError};
use crate::services::AccessService;

/// Read-only view over `prescriptions`; rows are written elsewhere.
pub struct PrescriptionService {
    supabase: SupabaseClient,
    access: AccessService,
}

impl PrescriptionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            access: AccessService::new(config),
        }
    }

    pub async fn list_prescriptions(
        &self,
        caller_id: &str,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Vec<Prescription>, RecordsError> {
        let scope = self.access.resolve_scope(caller_id, patient_id, auth_token).await?;

        let path = format!(
            "/rest/v1/prescriptions?{}&order=created_at.desc",
            scope.filter(patient_id)
        );
        let prescriptions: Vec<Prescription> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(prescriptions)
    }
}
