use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use shared_config::AppConfig;
use shared_database::supabase::{eq, SupabaseClient, SupabaseError};
use shared_models::auth::Role;

use crate::models::{AddDoctorRequest, HospitalDoctor, HospitalError, ProvisionedDoctor};

/// Provisions doctor accounts for a hospital and lists its staff.
pub struct StaffService {
    supabase: SupabaseClient,
    service_key: String,
}

impl StaffService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            service_key: config.service_key().to_string(),
        }
    }

    /// Invites the auth identity, then writes the `users` and `doctors` rows
    /// keyed by the invited user's id.
    pub async fn add_doctor(
        &self,
        hospital_id: &str,
        request: AddDoctorRequest,
    ) -> Result<ProvisionedDoctor, HospitalError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();

        let hospital_path = format!("/rest/v1/hospitals?id={}&select=id", eq(hospital_id));
        if self.supabase.select_one(&hospital_path, &self.service_key).await?.is_none() {
            return Err(HospitalError::NotFound);
        }

        debug!("Inviting doctor {} to hospital {}", email, hospital_id);

        let invited: Value = self.supabase.request(
            Method::POST,
            "/auth/v1/invite",
            Some(&self.service_key),
            Some(json!({
                "email": email,
                "data": { "name": request.name.trim(), "role": Role::Doctor.as_str() }
            })),
        ).await.map_err(|e| match SupabaseError::find(&e) {
            Some(SupabaseError::Conflict(_)) | Some(SupabaseError::Api { status: 422, .. }) => {
                HospitalError::AlreadyExists
            }
            _ => HospitalError::Database(e.to_string()),
        })?;

        let user_id = invited.get("id")
            .or_else(|| invited.get("user").and_then(|u| u.get("id")))
            .and_then(Value::as_str)
            .ok_or_else(|| HospitalError::Database("Invite response did not include a user id".to_string()))?
            .to_string();

        let _: Value = self.supabase.request(
            Method::POST,
            "/rest/v1/users",
            Some(&self.service_key),
            Some(json!({
                "id": user_id,
                "name": request.name.trim(),
                "email": email,
                "phone": request.phone.trim(),
                "role": Role::Doctor.as_str(),
            })),
        ).await?;

        let _: Value = self.supabase.request(
            Method::POST,
            "/rest/v1/doctors",
            Some(&self.service_key),
            Some(json!({
                "id": user_id,
                "hospital_id": hospital_id,
                "qualification": request.qualification.trim(),
                "specialization": request.specialization.trim(),
                "experience_years": request.experience_years,
            })),
        ).await.map_err(|e| {
            error!("Doctor row insert failed after user {} was created: {}", user_id, e);
            HospitalError::from(e)
        })?;

        info!("Doctor {} added to hospital {}", user_id, hospital_id);

        Ok(ProvisionedDoctor {
            id: user_id,
            name: request.name.trim().to_string(),
            email,
            hospital_id: hospital_id.to_string(),
            qualification: request.qualification.trim().to_string(),
            specialization: request.specialization.trim().to_string(),
            invited: true,
        })
    }

    pub async fn list_doctors(
        &self,
        hospital_id: &str,
        auth_token: &str,
    ) -> Result<Vec<HospitalDoctor>, HospitalError> {
        debug!("Listing doctors for hospital {}", hospital_id);

        let path = format!(
            "/rest/v1/doctors?hospital_id={}&select=id,qualification,specialization,rating,experience_years,user:users(name,email,phone)",
            eq(hospital_id)
        );
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(rows.iter().filter_map(HospitalDoctor::from_row).collect())
    }
}
