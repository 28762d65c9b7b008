use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub cloudinary_base_url: String,
    pub media_configured: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            cloudinary_base_url: "http://localhost:54322".to_string(),
            media_configured: true,
        }
    }
}

impl TestConfig {
    /// Points both Supabase and the media store at the same mock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            cloudinary_base_url: uri.to_string(),
            ..Default::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        let (cloud, key, secret) = if self.media_configured {
            ("test-cloud", "test-media-key", "test-media-secret")
        } else {
            ("", "", "")
        };

        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            cloudinary_cloud_name: cloud.to_string(),
            cloudinary_api_key: key.to_string(),
            cloudinary_api_secret: secret.to_string(),
            cloudinary_base_url: self.cloudinary_base_url.clone(),
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: Role,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", Role::Patient)
    }
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn system_admin(email: &str) -> Self {
        Self::new(email, Role::SystemAdmin)
    }

    pub fn hospital_admin(email: &str) -> Self {
        Self::new(email, Role::HospitalAdmin)
    }

    /// Principal as the auth middleware would build it from a token.
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some("authenticated".to_string()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        // Supabase tokens carry the database role, not the application role
        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "aud": "authenticated",
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn user_row(user_id: &str, email: &str, role: Role) -> serde_json::Value {
        json!({
            "id": user_id,
            "name": "Test User",
            "email": email,
            "phone": "+91 12345 67890",
            "role": role.as_str(),
            "gender": "female",
            "dob": "1990-01-01",
            "blood_group": "O+",
            "avatar_url": null,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn role_row(role: Role) -> serde_json::Value {
        json!({ "role": role.as_str() })
    }

    pub fn hospital_row(hospital_id: &str) -> serde_json::Value {
        json!({
            "id": hospital_id,
            "name": "City Hospital",
            "slug": "city-hospital",
            "contact_email": "contact@hospital.com",
            "contact_phone": "+91 12345 67890",
            "location": {
                "address": "1 Main Road",
                "city": "Pune",
                "state": "MH",
                "country": "India",
                "pincode": "411001"
            },
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn template_row(template_id: &str, hospital_id: &str, url: &str) -> serde_json::Value {
        json!({
            "id": template_id,
            "hospital_id": hospital_id,
            "template_type": "prescription",
            "template_url": url,
            "placeholders": ["dr_name", "patient_name"]
        })
    }

    pub fn doctor_row(doctor_id: &str, hospital_id: &str) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "hospital_id": hospital_id,
            "qualification": "MBBS",
            "specialization": "Cardiology",
            "rating": 4.5,
            "experience_years": 10
        })
    }

    pub fn link_row(doctor_id: &str, patient_id: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "patient_id": patient_id,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_row(appointment_id: &str, patient_id: &str, doctor_id: &str, status: &str) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "hospital_id": Uuid::new_v4(),
            "scheduled_at": "2030-12-25T10:00:00Z",
            "status": status,
            "notes": "Follow-up",
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn medical_record_row(record_id: &str, patient_id: &str, doctor_id: &str) -> serde_json::Value {
        json!({
            "id": record_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "record_type": "lab_report",
            "title": "CBC",
            "description": "Complete blood count",
            "file_url": null,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn prescription_row(patient_id: &str, doctor_id: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "medicine": "Amoxicillin",
            "dosage": "500mg",
            "duration": "7 days",
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn uploaded_asset(public_id: &str, format: &str) -> serde_json::Value {
        json!({
            "public_id": public_id,
            "secure_url": format!("https://res.cloudinary.com/test-cloud/image/upload/v1700000000/{}.{}", public_id, format),
            "resource_type": "image",
            "format": format,
            "bytes": 5
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "error": {
                "message": message,
                "code": code
            }
        })
    }
}
