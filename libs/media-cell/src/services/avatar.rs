use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::cloudinary::{CloudinaryClient, FilePayload, ResourceType};
use shared_database::supabase::{eq, null_column, SupabaseClient};

use crate::models::{AssetError, AvatarResult, MediaUpload, UploadResult, AVATAR_FOLDER};

pub struct AvatarService {
    supabase: SupabaseClient,
    media: CloudinaryClient,
}

impl AvatarService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            media: CloudinaryClient::new(config),
        }
    }

    /// Stores an arbitrary file under the avatars folder and returns its URL.
    pub async fn upload_file(&self, upload: MediaUpload) -> Result<UploadResult, AssetError> {
        let payload = FilePayload::parse(&upload.file_data, upload.file_type.as_deref())?;
        let asset = self.media.upload(&payload, AVATAR_FOLDER, ResourceType::Auto).await?;

        info!("Uploaded {} to {}", asset.public_id, AVATAR_FOLDER);
        Ok(UploadResult {
            url: asset.secure_url,
            public_id: asset.public_id,
        })
    }

    async fn current_avatar(&self, user_id: &str, auth_token: &str) -> Result<Option<String>, AssetError> {
        let path = format!("/rest/v1/users?id={}&select=avatar_url", eq(user_id));
        let row = self.supabase.select_one(&path, auth_token)
            .await?
            .ok_or(AssetError::ProfileNotFound)?;

        Ok(row.get("avatar_url")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string))
    }

    async fn set_avatar_column(&self, user_id: &str, body: Value, auth_token: &str) -> Result<(), AssetError> {
        let path = format!("/rest/v1/users?id={}", eq(user_id));
        let rows = self.supabase.write_returning(Method::PATCH, &path, auth_token, body).await?;

        if rows.is_empty() {
            return Err(AssetError::ProfileNotFound);
        }
        Ok(())
    }

    /// Replaces the user's avatar. The old object is destroyed before the new
    /// one is uploaded; a failed destroy does not stop the replacement.
    pub async fn replace_avatar(
        &self,
        user_id: &str,
        upload: MediaUpload,
        auth_token: &str,
    ) -> Result<AvatarResult, AssetError> {
        let payload = FilePayload::parse(&upload.file_data, upload.file_type.as_deref())?;
        if !payload.is_image() {
            return Err(AssetError::NotAnImage);
        }

        debug!("Replacing avatar for user {}", user_id);

        if let Some(previous) = self.current_avatar(user_id, auth_token).await? {
            self.media.destroy_by_url_best_effort(&previous).await;
        }

        let asset = self.media.upload(&payload, AVATAR_FOLDER, ResourceType::Image).await?;

        self.set_avatar_column(user_id, json!({ "avatar_url": asset.secure_url }), auth_token).await?;

        info!("Avatar updated for user {}", user_id);
        Ok(AvatarResult { avatar_url: Some(asset.secure_url) })
    }

    pub async fn remove_avatar(&self, user_id: &str, auth_token: &str) -> Result<AvatarResult, AssetError> {
        debug!("Removing avatar for user {}", user_id);

        if let Some(previous) = self.current_avatar(user_id, auth_token).await? {
            self.media.destroy_by_url_best_effort(&previous).await;
        }

        self.set_avatar_column(user_id, null_column("avatar_url"), auth_token).await?;

        info!("Avatar removed for user {}", user_id);
        Ok(AvatarResult { avatar_url: None })
    }
}
