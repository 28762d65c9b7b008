use tracing::{debug, warn};

use doctor_cell::models::DoctorError;
use doctor_cell::services::{DoctorService, LinkageService};
use shared_config::AppConfig;

use crate::models::{RecordScope, RecordsError};

/// Decides how much of a patient's clinical history the caller can read.
pub struct AccessService {
    doctors: DoctorService,
    linkage: LinkageService,
}

impl AccessService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            doctors: DoctorService::new(config),
            linkage: LinkageService::new(config),
        }
    }

    pub async fn resolve_scope(
        &self,
        caller_id: &str,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<RecordScope, RecordsError> {
        if caller_id == patient_id {
            return Ok(RecordScope::Own);
        }

        match self.doctors.require_doctor(caller_id, auth_token).await {
            Ok(()) => {}
            Err(DoctorError::NotADoctor) => {
                warn!("User {} tried to read records of patient {}", caller_id, patient_id);
                return Err(RecordsError::AccessDenied);
            }
            Err(e) => return Err(e.into()),
        }

        if !self.linkage.is_linked(caller_id, patient_id, auth_token).await? {
            warn!("Doctor {} is not linked to patient {}", caller_id, patient_id);
            return Err(RecordsError::AccessDenied);
        }

        debug!("Doctor {} reads authored records of {}", caller_id, patient_id);
        Ok(RecordScope::AuthoredBy(caller_id.to_string()))
    }

    /// Gate for writes: the caller must be a doctor linked to the patient.
    pub async fn require_linked_doctor(
        &self,
        doctor_id: &str,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<(), RecordsError> {
        self.doctors.require_doctor(doctor_id, auth_token).await?;
        self.linkage.ensure_linked(doctor_id, patient_id, auth_token).await?;
        Ok(())
    }
}
