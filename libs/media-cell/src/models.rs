use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::cloudinary::MediaError;
use shared_database::supabase::SupabaseError;
use shared_models::error::AppError;

pub const AVATAR_FOLDER: &str = "avatars";

/// Base64 upload body. `file_data` may be a bare base64 string or a data URI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaUpload {
    #[serde(default)]
    pub file_data: String,
    pub file_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    pub url: String,
    pub public_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarResult {
    pub avatar_url: Option<String>,
}

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("User profile not found")]
    ProfileNotFound,

    #[error("Avatar must be an image")]
    NotAnImage,

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for AssetError {
    fn from(err: anyhow::Error) -> Self {
        match SupabaseError::find(&err) {
            Some(SupabaseError::Auth(_)) => AssetError::Unauthorized,
            _ => AssetError::Database(err.to_string()),
        }
    }
}

impl From<AssetError> for AppError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::ProfileNotFound => AppError::NotFound(err.to_string()),
            AssetError::NotAnImage => AppError::BadRequest(err.to_string()),
            AssetError::Media(MediaError::InvalidPayload(msg)) => AppError::BadRequest(msg),
            AssetError::Media(e) => AppError::ExternalService(e.to_string()),
            AssetError::Unauthorized => AppError::Auth(err.to_string()),
            AssetError::Database(msg) => AppError::Database(msg),
        }
    }
}
