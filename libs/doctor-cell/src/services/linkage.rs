use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::{eq, ilike_pattern, SupabaseClient};

use crate::models::{
    parse_dob, age_on, DoctorError, LinkOutcome, LinkedPatient, PageRange, PatientChart,
    PatientMatch, PATIENT_SEARCH_LIMIT,
};

/// Doctor-patient links and everything that depends on them.
pub struct LinkageService {
    supabase: SupabaseClient,
}

impl LinkageService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn search_patients(&self, term: &str, auth_token: &str) -> Result<Vec<PatientMatch>, DoctorError> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Searching patients by email: {}", term);

        let path = format!(
            "/rest/v1/users?role=eq.patient&email=ilike.{}&select=id,name,email&limit={}",
            ilike_pattern(term),
            PATIENT_SEARCH_LIMIT
        );
        let matches: Vec<PatientMatch> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(matches)
    }

    pub async fn is_linked(&self, doctor_id: &str, patient_id: &str, auth_token: &str) -> Result<bool, DoctorError> {
        let path = format!(
            "/rest/v1/doctor_patient?doctor_id={}&patient_id={}&select=id",
            eq(doctor_id), eq(patient_id)
        );
        Ok(self.supabase.select_one(&path, auth_token).await?.is_some())
    }

    pub async fn ensure_linked(&self, doctor_id: &str, patient_id: &str, auth_token: &str) -> Result<(), DoctorError> {
        if self.is_linked(doctor_id, patient_id, auth_token).await? {
            Ok(())
        } else {
            Err(DoctorError::NotLinked)
        }
    }

    /// Links a patient to the doctor. An existing link is reported and left
    /// alone so repeated submits never create duplicates.
    pub async fn link_patient(
        &self,
        doctor_id: &str,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<LinkOutcome, DoctorError> {
        let patient_path = format!("/rest/v1/users?id={}&role=eq.patient&select=id", eq(patient_id));
        if self.supabase.select_one(&patient_path, auth_token).await?.is_none() {
            return Err(DoctorError::PatientNotFound);
        }

        if self.is_linked(doctor_id, patient_id, auth_token).await? {
            debug!("Patient {} already linked to doctor {}", patient_id, doctor_id);
            return Ok(LinkOutcome {
                linked: false,
                already_linked: true,
                patient_id: patient_id.to_string(),
            });
        }

        self.supabase.write_returning(
            Method::POST,
            "/rest/v1/doctor_patient",
            auth_token,
            json!({ "doctor_id": doctor_id, "patient_id": patient_id }),
        ).await?;

        info!("Linked patient {} to doctor {}", patient_id, doctor_id);

        Ok(LinkOutcome {
            linked: true,
            already_linked: false,
            patient_id: patient_id.to_string(),
        })
    }

    pub async fn list_patients(
        &self,
        doctor_id: &str,
        range: PageRange,
        auth_token: &str,
    ) -> Result<Vec<LinkedPatient>, DoctorError> {
        let (offset, limit) = range.to_offset_limit()?;
        debug!("Listing patients for doctor {} (offset {}, limit {})", doctor_id, offset, limit);

        let path = format!(
            "/rest/v1/doctor_patient?doctor_id={}&select=created_at,patient:users(id,name,email,phone,gender,dob,blood_group,avatar_url)&order=created_at.desc&offset={}&limit={}",
            eq(doctor_id), offset, limit
        );
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let today = Utc::now().date_naive();
        Ok(rows.iter()
            .filter_map(|row| LinkedPatient::from_link_row(row, today))
            .collect())
    }

    /// Patient profile plus the clinical rows this doctor authored for them.
    pub async fn patient_chart(
        &self,
        doctor_id: &str,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<PatientChart, DoctorError> {
        self.ensure_linked(doctor_id, patient_id, auth_token).await?;

        let patient_path = format!("/rest/v1/users?id={}", eq(patient_id));
        let appointments_path = format!(
            "/rest/v1/appointments?patient_id={}&doctor_id={}&order=scheduled_at.desc",
            eq(patient_id), eq(doctor_id)
        );
        let records_path = format!(
            "/rest/v1/medical_records?patient_id={}&doctor_id={}&order=created_at.desc",
            eq(patient_id), eq(doctor_id)
        );
        let prescriptions_path = format!(
            "/rest/v1/prescriptions?patient_id={}&doctor_id={}&order=created_at.desc",
            eq(patient_id), eq(doctor_id)
        );

        let (patient, appointments, medical_records, prescriptions) = tokio::try_join!(
            self.supabase.select_one(&patient_path, auth_token),
            self.fetch_rows(&appointments_path, auth_token),
            self.fetch_rows(&records_path, auth_token),
            self.fetch_rows(&prescriptions_path, auth_token),
        )?;

        let patient = patient.ok_or(DoctorError::PatientNotFound)?;
        let age = patient.get("dob")
            .and_then(Value::as_str)
            .and_then(parse_dob)
            .and_then(|dob| age_on(dob, Utc::now().date_naive()));

        Ok(PatientChart {
            patient,
            age,
            appointments,
            medical_records,
            prescriptions,
        })
    }

    async fn fetch_rows(&self, path: &str, auth_token: &str) -> anyhow::Result<Vec<Value>> {
        self.supabase.request(Method::GET, path, Some(auth_token), None).await
    }
}
