use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::{eq, SupabaseClient, SupabaseError};
use shared_models::auth::Role;

use crate::models::{
    AuthError, ResolvedIdentity, Session, SignInRequest, SignUpRequest, SignUpResponse,
};

pub struct IdentityService {
    supabase: SupabaseClient,
    service_key: String,
}

impl IdentityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            service_key: config.service_key().to_string(),
        }
    }

    /// Registers an auth identity and its `users` profile row. New accounts
    /// are always patients; staff accounts are provisioned by admins.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpResponse, AuthError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();
        debug!("Signing up new account: {}", email);

        let response: Value = self.supabase.request(
            Method::POST,
            "/auth/v1/signup",
            None,
            Some(json!({
                "email": email,
                "password": request.password,
                "data": { "name": request.name }
            })),
        ).await.map_err(|e| match SupabaseError::find(&e) {
            Some(SupabaseError::Api { status: 400 | 422, message }) => AuthError::Validation(message.clone()),
            _ => AuthError::Upstream(e.to_string()),
        })?;

        // With email confirmation enabled the body is the bare user object
        let user = response.get("user").unwrap_or(&response);
        let user_id = user.get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::Upstream("Sign-up response did not include a user id".to_string()))?
            .to_string();

        let session = if response.get("access_token").is_some() {
            serde_json::from_value::<Session>(response.clone()).ok()
        } else {
            None
        };

        let _: Value = self.supabase.request(
            Method::POST,
            "/rest/v1/users",
            Some(&self.service_key),
            Some(json!({
                "id": user_id,
                "name": request.name.trim(),
                "email": email,
                "role": Role::Patient.as_str(),
            })),
        ).await.map_err(|e| {
            error!("Profile insert failed after auth user {} was created: {}", user_id, e);
            AuthError::from(e)
        })?;

        info!("Account created for {}", user_id);

        Ok(SignUpResponse {
            user_id,
            email,
            role: Role::Patient,
            session,
        })
    }

    pub async fn sign_in(&self, request: SignInRequest) -> Result<Session, AuthError> {
        request.validate()?;
        debug!("Signing in: {}", request.email);

        let session: Session = self.supabase.request(
            Method::POST,
            "/auth/v1/token?grant_type=password",
            None,
            Some(json!({
                "email": request.email.trim(),
                "password": request.password,
            })),
        ).await.map_err(|e| match SupabaseError::find(&e) {
            Some(SupabaseError::Auth(_)) | Some(SupabaseError::Api { status: 400, .. }) => {
                AuthError::InvalidCredentials
            }
            _ => AuthError::Upstream(e.to_string()),
        })?;

        Ok(session)
    }

    pub async fn sign_out(&self, auth_token: &str) -> Result<(), AuthError> {
        debug!("Signing out session");

        let _: Value = self.supabase.request(
            Method::POST,
            "/auth/v1/logout",
            Some(auth_token),
            None,
        ).await.map_err(|e| {
            warn!("Sign-out failed: {}", e);
            AuthError::from(e)
        })?;

        Ok(())
    }

    /// Current principal with its stored profile and resolved role.
    pub async fn current_identity(
        &self,
        user_id: &str,
        email: Option<String>,
        auth_token: &str,
    ) -> Result<ResolvedIdentity, AuthError> {
        let path = format!("/rest/v1/users?id={}", eq(user_id));
        let profile = self.supabase.select_one(&path, auth_token)
            .await?
            .ok_or(AuthError::ProfileNotFound)?;

        let raw_role = profile.get("role").and_then(Value::as_str).unwrap_or_default();
        let role = raw_role.parse::<Role>()
            .map_err(|_| AuthError::UnknownRole(raw_role.to_string()))?;

        Ok(ResolvedIdentity {
            user_id: user_id.to_string(),
            email,
            role,
            profile,
        })
    }
}
