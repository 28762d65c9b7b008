use std::collections::BTreeMap;
use std::fmt::Write as _;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Media storage is not configured")]
    NotConfigured,

    #[error("Invalid file payload: {0}")]
    InvalidPayload(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Destroy failed: {0}")]
    Destroy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Image,
    Raw,
    Video,
    /// Upload-only; the store picks the concrete type.
    Auto,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Image => "image",
            ResourceType::Raw => "raw",
            ResourceType::Video => "video",
            ResourceType::Auto => "auto",
        }
    }

    /// Recovers the stored type from a delivery URL (`.../<type>/upload/...`).
    pub fn from_url(url: &str) -> Self {
        if url.contains("/raw/upload/") {
            ResourceType::Raw
        } else if url.contains("/video/upload/") {
            ResourceType::Video
        } else {
            ResourceType::Image
        }
    }
}

/// Decoded upload body, validated before anything is sent upstream.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FilePayload {
    /// Accepts either a bare base64 string or a `data:<mime>;base64,<data>` URI.
    /// `declared_type` wins over the mime found in the URI.
    pub fn parse(file_data: &str, declared_type: Option<&str>) -> Result<Self, MediaError> {
        let file_data = file_data.trim();
        if file_data.is_empty() {
            return Err(MediaError::InvalidPayload("No file uploaded".to_string()));
        }

        let (uri_mime, encoded) = match file_data.strip_prefix("data:") {
            Some(rest) => {
                let (meta, data) = rest.split_once(',')
                    .ok_or_else(|| MediaError::InvalidPayload("Malformed data URI".to_string()))?;
                let mime = meta.trim_end_matches(";base64");
                (Some(mime.to_string()), data)
            }
            None => (None, file_data),
        };

        let bytes = BASE64.decode(encoded)
            .map_err(|e| MediaError::InvalidPayload(format!("Failed to decode base64 data: {}", e)))?;

        if bytes.is_empty() {
            return Err(MediaError::InvalidPayload("No file uploaded".to_string()));
        }

        let mime_type = declared_type
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .or(uri_mime.filter(|m| !m.is_empty()))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Ok(Self { mime_type, bytes })
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.bytes))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedAsset {
    pub secure_url: String,
    pub public_id: String,
    pub resource_type: Option<String>,
    pub format: Option<String>,
    pub bytes: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

pub struct CloudinaryClient {
    client: Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.cloudinary_base_url.trim_end_matches('/').to_string(),
            cloud_name: config.cloudinary_cloud_name.clone(),
            api_key: config.cloudinary_api_key.clone(),
            api_secret: config.cloudinary_api_secret.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.cloud_name.is_empty() && !self.api_key.is_empty() && !self.api_secret.is_empty()
    }

    /// SHA-256 over `k1=v1&k2=v2...` (keys sorted) followed by the API secret.
    pub fn sign(&self, params: &BTreeMap<&str, String>) -> String {
        let to_sign = params.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let digest = Sha256::digest(format!("{}{}", to_sign, self.api_secret).as_bytes());
        digest.iter().fold(String::with_capacity(64), |mut out, b| {
            let _ = write!(out, "{:02x}", b);
            out
        })
    }

    fn endpoint(&self, resource_type: ResourceType, action: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, self.cloud_name, resource_type.as_str(), action)
    }

    fn signed_form(&self, mut params: BTreeMap<&str, String>) -> Vec<(String, String)> {
        params.insert("timestamp", chrono::Utc::now().timestamp().to_string());
        let signature = self.sign(&params);

        let mut form: Vec<(String, String)> = params.into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        form.push(("api_key".to_string(), self.api_key.clone()));
        form.push(("signature".to_string(), signature));
        form.push(("signature_algorithm".to_string(), "sha256".to_string()));
        form
    }

    pub async fn upload(
        &self,
        payload: &FilePayload,
        folder: &str,
        resource_type: ResourceType,
    ) -> Result<UploadedAsset, MediaError> {
        if !self.is_configured() {
            return Err(MediaError::NotConfigured);
        }

        debug!("Uploading {} bytes ({}) to folder {}", payload.bytes.len(), payload.mime_type, folder);

        let mut params = BTreeMap::new();
        params.insert("folder", folder.to_string());

        let mut form = self.signed_form(params);
        form.push(("file".to_string(), payload.to_data_uri()));

        let response = self.client
            .post(self.endpoint(resource_type, "upload"))
            .form(&form)
            .send()
            .await
            .map_err(|e| MediaError::Upload(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Media upload error ({}): {}", status, text);
            return Err(MediaError::Upload(format!("({}) {}", status, text)));
        }

        let asset = response.json::<UploadedAsset>()
            .await
            .map_err(|e| MediaError::Upload(e.to_string()))?;

        debug!("Uploaded asset {}", asset.public_id);
        Ok(asset)
    }

    pub async fn destroy(&self, public_id: &str, resource_type: ResourceType) -> Result<(), MediaError> {
        if !self.is_configured() {
            return Err(MediaError::NotConfigured);
        }

        let resource_type = match resource_type {
            ResourceType::Auto => ResourceType::Image,
            other => other,
        };

        debug!("Destroying asset {} ({})", public_id, resource_type.as_str());

        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_string());

        let response = self.client
            .post(self.endpoint(resource_type, "destroy"))
            .form(&self.signed_form(params))
            .send()
            .await
            .map_err(|e| MediaError::Destroy(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MediaError::Destroy(format!("({}) {}", status, text)));
        }

        let body = response.json::<DestroyResponse>()
            .await
            .map_err(|e| MediaError::Destroy(e.to_string()))?;

        if body.result != "ok" {
            return Err(MediaError::Destroy(format!("{}: {}", public_id, body.result)));
        }

        Ok(())
    }

    /// Destroys the asset behind a delivery URL. Failures are logged and
    /// swallowed so the caller's record-level operation can proceed.
    pub async fn destroy_by_url_best_effort(&self, url: &str) {
        let Some(public_id) = public_id_from_url(url) else {
            warn!("Could not derive public id from {}, skipping destroy", url);
            return;
        };

        if let Err(e) = self.destroy(&public_id, ResourceType::from_url(url)).await {
            warn!("Failed to delete media asset {}: {}", public_id, e);
        }
    }
}

/// Recovers the public id (folder path without extension) from a delivery URL
/// such as `https://res.cloudinary.com/<cloud>/image/upload/v17/avatars/abc.png`.
pub fn public_id_from_url(url: &str) -> Option<String> {
    let (_, after_upload) = url.split_once("/upload/")?;
    let after_upload = after_upload.split(['?', '#']).next().unwrap_or(after_upload);

    let mut segments: Vec<&str> = after_upload.split('/').filter(|s| !s.is_empty()).collect();
    if let Some(first) = segments.first() {
        let is_version = first.len() > 1
            && first.starts_with('v')
            && first[1..].chars().all(|c| c.is_ascii_digit());
        if is_version {
            segments.remove(0);
        }
    }

    let last = segments.pop()?;
    let stem = match last.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => last,
    };
    segments.push(stem);

    Some(segments.join("/"))
}
