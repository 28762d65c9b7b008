use reqwest::Method;
use tracing::{debug, info, warn};

use auth_cell::services::RoleService;
use doctor_cell::services::LinkageService;
use shared_config::AppConfig;
use shared_database::supabase::{eq, SupabaseClient};
use shared_models::auth::Role;

use crate::models::{UpdateUserRequest, UserError, UserProfile};

pub struct UserService {
    supabase: SupabaseClient,
    roles: RoleService,
    linkage: LinkageService,
}

impl UserService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            roles: RoleService::new(config),
            linkage: LinkageService::new(config),
        }
    }

    /// Self, any admin, or a doctor linked to the user may read a profile.
    async fn ensure_can_view(&self, caller_id: &str, user_id: &str, auth_token: &str) -> Result<(), UserError> {
        if caller_id == user_id {
            return Ok(());
        }

        match self.roles.resolve_role(caller_id, auth_token).await? {
            role if role.is_admin() => Ok(()),
            Role::Doctor => {
                if self.linkage.is_linked(caller_id, user_id, auth_token).await? {
                    Ok(())
                } else {
                    warn!("Doctor {} is not linked to user {}", caller_id, user_id);
                    Err(UserError::AccessDenied)
                }
            }
            _ => Err(UserError::AccessDenied),
        }
    }

    pub async fn get_user(&self, caller_id: &str, user_id: &str, auth_token: &str) -> Result<UserProfile, UserError> {
        self.ensure_can_view(caller_id, user_id, auth_token).await?;

        debug!("Fetching user {}", user_id);

        let path = format!("/rest/v1/users?id={}", eq(user_id));
        let row = self.supabase.select_one(&path, auth_token)
            .await?
            .ok_or(UserError::NotFound)?;

        serde_json::from_value(row).map_err(|e| UserError::Database(e.to_string()))
    }

    pub async fn update_user(
        &self,
        caller_id: &str,
        user_id: &str,
        request: UpdateUserRequest,
        auth_token: &str,
    ) -> Result<UserProfile, UserError> {
        let patch = request.to_patch()?;

        if caller_id != user_id {
            self.roles.require_role(caller_id, auth_token, &[Role::SystemAdmin]).await?;
        }

        let path = format!("/rest/v1/users?id={}", eq(user_id));
        let mut rows = self.supabase.write_returning(Method::PATCH, &path, auth_token, patch).await?;

        if rows.is_empty() {
            return Err(UserError::NotFound);
        }

        let profile: UserProfile = serde_json::from_value(rows.swap_remove(0))
            .map_err(|e| UserError::Database(e.to_string()))?;

        info!("User {} updated by {}", user_id, caller_id);
        Ok(profile)
    }
}
