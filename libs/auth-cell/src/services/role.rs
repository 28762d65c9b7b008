use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::supabase::{eq, SupabaseClient};
use shared_models::auth::Role;

use crate::models::RoleError;

/// Resolves the application role of an authenticated principal from the
/// `users` table and gates operations on it.
pub struct RoleService {
    supabase: SupabaseClient,
}

impl RoleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn resolve_role(&self, user_id: &str, auth_token: &str) -> Result<Role, RoleError> {
        debug!("Resolving role for user: {}", user_id);

        let path = format!("/rest/v1/users?id={}&select=role", eq(user_id));
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| RoleError::Upstream(e.to_string()))?;

        let raw = rows.first()
            .ok_or(RoleError::ProfileNotFound)?
            .get("role")
            .and_then(Value::as_str)
            .ok_or_else(|| RoleError::UnknownRole("<none>".to_string()))?;

        raw.parse::<Role>().map_err(|_| RoleError::UnknownRole(raw.to_string()))
    }

    /// Resolves the role and fails with `Forbidden` unless it is in `allowed`.
    pub async fn require_role(
        &self,
        user_id: &str,
        auth_token: &str,
        allowed: &[Role],
    ) -> Result<Role, RoleError> {
        let role = self.resolve_role(user_id, auth_token).await?;

        if !allowed.contains(&role) {
            warn!("User {} with role {} denied; requires {:?}", user_id, role, allowed);
            return Err(RoleError::Forbidden {
                required: allowed.iter()
                    .map(Role::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        Ok(role)
    }
}
