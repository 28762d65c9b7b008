use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use shared_database::supabase::SupabaseError;
use shared_models::auth::Role;
use shared_models::error::AppError;

pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl SignUpRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.name.trim().is_empty() {
            return Err(AuthError::Validation("name is required".to_string()));
        }
        if !looks_like_email(&self.email) {
            return Err(AuthError::Validation("a valid email is required".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

impl SignInRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(AuthError::Validation("email and password are required".to_string()));
        }
        Ok(())
    }
}

/// Session as issued by the auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub user: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpResponse {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    /// Absent when the auth service requires email confirmation first.
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Role,
    pub profile: Value,
}

pub(crate) fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User profile not found")]
    ProfileNotFound,

    #[error("Stored role is not recognised: {0}")]
    UnknownRole(String),

    #[error("Auth service error: {0}")]
    Upstream(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        match SupabaseError::find(&err) {
            Some(SupabaseError::Auth(_)) => AuthError::InvalidCredentials,
            _ => AuthError::Upstream(err.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => AppError::ValidationError(msg),
            AuthError::InvalidCredentials => AppError::Auth(err.to_string()),
            AuthError::ProfileNotFound => AppError::NotFound(err.to_string()),
            AuthError::UnknownRole(_) => AppError::Internal(err.to_string()),
            AuthError::Upstream(msg) => AppError::ExternalService(msg),
        }
    }
}

/// Failures of the per-request role gate.
#[derive(Error, Debug)]
pub enum RoleError {
    #[error("User profile not found")]
    ProfileNotFound,

    #[error("Stored role is not recognised: {0}")]
    UnknownRole(String),

    #[error("Access denied. Requires one of: {required}")]
    Forbidden { required: String },

    #[error("Role lookup failed: {0}")]
    Upstream(String),
}

impl From<RoleError> for AppError {
    fn from(err: RoleError) -> Self {
        match err {
            RoleError::ProfileNotFound => AppError::NotFound(err.to_string()),
            RoleError::UnknownRole(_) => AppError::Forbidden(err.to_string()),
            RoleError::Forbidden { .. } => AppError::Forbidden(err.to_string()),
            RoleError::Upstream(msg) => AppError::ExternalService(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_sign_up_validation() {
        let ok = SignUpRequest {
            name: "Jane".to_string(),
            email: "jane@example.com".to_string(),
            password: "secret1".to_string(),
        };
        assert!(ok.validate().is_ok());

        let short = SignUpRequest { password: "123".to_string(), ..ok.clone() };
        assert_matches!(short.validate(), Err(AuthError::Validation(_)));

        let no_name = SignUpRequest { name: "  ".to_string(), ..ok.clone() };
        assert_matches!(no_name.validate(), Err(AuthError::Validation(_)));

        let bad_email = SignUpRequest { email: "jane".to_string(), ..ok };
        assert_matches!(bad_email.validate(), Err(AuthError::Validation(_)));
    }

    #[test]
    fn test_password_length_counts_characters() {
        let base = SignUpRequest {
            name: "Jane".to_string(),
            email: "jane@example.com".to_string(),
            password: String::new(),
        };

        // Five characters, ten bytes
        let multibyte = SignUpRequest { password: "парол".to_string(), ..base.clone() };
        assert_eq!(multibyte.password.len(), 10);
        assert_matches!(multibyte.validate(), Err(AuthError::Validation(_)));

        let six = SignUpRequest { password: "密码密码密码".to_string(), ..base };
        assert!(six.validate().is_ok());
    }

    #[test]
    fn test_email_shape() {
        assert!(looks_like_email("a@b.co"));
        assert!(!looks_like_email("@b.co"));
        assert!(!looks_like_email("a@bco"));
        assert!(!looks_like_email("a@.co"));
    }

    #[test]
    fn test_role_error_maps_to_forbidden() {
        let err: AppError = RoleError::Forbidden { required: "doctor".to_string() }.into();
        assert_matches!(err, AppError::Forbidden(_));

        let err: AppError = RoleError::ProfileNotFound.into();
        assert_matches!(err, AppError::NotFound(_));
    }
}
