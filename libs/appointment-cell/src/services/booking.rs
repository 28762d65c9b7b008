// libs/appointment-cell/src/services/booking.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use doctor_cell::models::PageRange;
use doctor_cell::services::{DoctorService, LinkageService};
use shared_config::AppConfig;
use shared_database::supabase::{eq, SupabaseClient};

use crate::models::{
    Appointment, AppointmentError, AppointmentRange, AppointmentSummary, CreateAppointmentRequest,
};

const SUMMARY_SELECT: &str =
    "id,scheduled_at,status,notes,patient:patient_id(id,name,email,phone,dob),hospital:hospital_id(id,name,location)";

pub struct AppointmentBookingService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    linkage: LinkageService,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            linkage: LinkageService::new(config),
        }
    }

    /// Books an appointment for a patient linked to the calling doctor. New
    /// appointments always start out scheduled.
    pub async fn create_appointment(
        &self,
        doctor_id: &str,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        request.validate()?;
        self.doctors.require_doctor(doctor_id, auth_token).await?;
        self.linkage.ensure_linked(doctor_id, &request.patient_id, auth_token).await?;

        debug!("Booking appointment for patient {} at {}", request.patient_id, request.scheduled_at);

        let mut rows = self.supabase.write_returning(
            Method::POST,
            "/rest/v1/appointments",
            auth_token,
            json!({
                "patient_id": request.patient_id,
                "doctor_id": doctor_id,
                "hospital_id": request.hospital_id,
                "scheduled_at": request.scheduled_at.to_rfc3339(),
                "status": "scheduled",
                "notes": request.notes,
            }),
        ).await?;

        if rows.is_empty() {
            return Err(AppointmentError::DatabaseError("Appointment insert returned no rows".to_string()));
        }

        let appointment: Appointment = serde_json::from_value(rows.swap_remove(0))
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!("Appointment {} booked by doctor {}", appointment.id, doctor_id);
        Ok(appointment)
    }

    /// The doctor's appointments, earliest first. Without `from`/`to` every
    /// row is returned.
    pub async fn list_for_doctor(
        &self,
        doctor_id: &str,
        range: AppointmentRange,
        auth_token: &str,
    ) -> Result<Vec<AppointmentSummary>, AppointmentError> {
        self.doctors.require_doctor(doctor_id, auth_token).await?;

        let mut path = format!(
            "/rest/v1/appointments?doctor_id={}&select={}&order=scheduled_at.asc",
            eq(doctor_id), SUMMARY_SELECT
        );

        if range.from.is_some() || range.to.is_some() {
            let (offset, limit) = PageRange { from: range.from, to: range.to }.to_offset_limit()?;
            path.push_str(&format!("&offset={}&limit={}", offset, limit));
        }

        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let today = Utc::now().date_naive();
        Ok(rows.iter()
            .filter_map(|row| AppointmentSummary::from_row(row, today))
            .collect())
    }

    pub async fn list_for_patient(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Vec<Value>, AppointmentError> {
        debug!("Listing appointments for patient {}", patient_id);

        let path = format!(
            "/rest/v1/appointments?patient_id={}&select=*,hospital:hospital_id(id,name)&order=scheduled_at.asc",
            eq(patient_id)
        );
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(rows)
    }

    /// Returns the appointment when the caller is its doctor or its patient.
    pub async fn get_appointment(
        &self,
        appointment_id: &str,
        caller_id: &str,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id={}", eq(appointment_id));
        let row = self.supabase.select_one(&path, auth_token)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        let appointment: Appointment = serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if appointment.doctor_id != caller_id && appointment.patient_id != caller_id {
            return Err(AppointmentError::Unauthorized);
        }

        Ok(appointment)
    }
}
