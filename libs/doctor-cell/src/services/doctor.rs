use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::{eq, SupabaseClient};

use crate::models::{Doctor, DoctorError, DoctorOverview};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Doctor row for `doctor_id`, with the user profile and hospital name
    /// embedded. Fails with `NotADoctor` when the account has no doctor row.
    pub async fn get_doctor(&self, doctor_id: &str, auth_token: &str) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!(
            "/rest/v1/doctors?id={}&select=*,user:users(name,email,phone,avatar_url),hospital:hospitals(id,name)",
            eq(doctor_id)
        );
        let row = self.supabase.select_one(&path, auth_token)
            .await?
            .ok_or(DoctorError::NotADoctor)?;

        serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string()))
    }

    /// Gate for doctor-only routes.
    pub async fn require_doctor(&self, user_id: &str, auth_token: &str) -> Result<(), DoctorError> {
        let path = format!("/rest/v1/doctors?id={}&select=id", eq(user_id));
        self.supabase.select_one(&path, auth_token)
            .await?
            .map(|_| ())
            .ok_or(DoctorError::NotADoctor)
    }

    pub async fn overview(&self, doctor_id: &str, auth_token: &str) -> Result<DoctorOverview, DoctorError> {
        self.overview_at(doctor_id, Utc::now(), auth_token).await
    }

    pub async fn overview_at(
        &self,
        doctor_id: &str,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<DoctorOverview, DoctorError> {
        debug!("Building overview for doctor {}", doctor_id);

        let day_start = now.date_naive().and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or(now);
        let day_end = day_start + Duration::days(1);

        let links_path = format!("/rest/v1/doctor_patient?doctor_id={}&select=id", eq(doctor_id));
        let today_path = format!(
            "/rest/v1/appointments?doctor_id={}&scheduled_at=gte.{}&scheduled_at=lt.{}&select=id",
            eq(doctor_id),
            timestamp_param(day_start),
            timestamp_param(day_end));
        let upcoming_path = format!(
            "/rest/v1/appointments?doctor_id={}&status=eq.scheduled&scheduled_at=gte.{}&select=id",
            eq(doctor_id),
            timestamp_param(now));

        let (links, today, upcoming) = tokio::try_join!(
            self.count_rows(&links_path, auth_token),
            self.count_rows(&today_path, auth_token),
            self.count_rows(&upcoming_path, auth_token),
        )?;

        Ok(DoctorOverview {
            linked_patients: links,
            todays_appointments: today,
            upcoming_appointments: upcoming,
        })
    }

    async fn count_rows(&self, path: &str, auth_token: &str) -> Result<usize, DoctorError> {
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            Some(auth_token),
            None,
        ).await?;

        Ok(rows.len())
    }
}

/// RFC 3339 in UTC with a `Z` suffix so it needs no escaping in a query.
pub fn timestamp_param(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
