// libs/appointment-cell/src/services/lifecycle.rs
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::{eq, SupabaseClient};

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

pub struct AppointmentLifecycleService {
    supabase: SupabaseClient,
}

impl AppointmentLifecycleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !Self::get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    pub fn get_valid_transitions(current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        if current_status.is_terminal() {
            return vec![];
        }

        // A live appointment may only move into a terminal state
        [AppointmentStatus::Scheduled, AppointmentStatus::Completed, AppointmentStatus::Cancelled]
            .into_iter()
            .filter(|next| next.is_terminal())
            .collect()
    }

    /// Moves an appointment owned by `doctor_id` to `new_status`. The update
    /// is conditioned on the status read beforehand so a concurrent change
    /// surfaces as a conflict instead of being overwritten.
    pub async fn update_status(
        &self,
        appointment_id: &str,
        doctor_id: &str,
        new_status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id={}&doctor_id={}",
            eq(appointment_id), eq(doctor_id)
        );
        let row = self.supabase.select_one(&path, auth_token)
            .await?
            .ok_or(AppointmentError::NotFound)?;
        let current: Appointment = serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Self::validate_status_transition(current.status, new_status)?;

        let guarded_path = format!("{}&status=eq.{}", path, current.status.as_str());
        let mut rows = self.supabase.write_returning(
            Method::PATCH,
            &guarded_path,
            auth_token,
            json!({ "status": new_status }),
        ).await?;

        if rows.is_empty() {
            return Err(AppointmentError::StatusConflict);
        }

        let updated: Appointment = serde_json::from_value(rows.swap_remove(0))
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!("Appointment {} moved {} -> {}", appointment_id, current.status, updated.status);
        Ok(updated)
    }
}
