use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client as S3Client;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::projects::{can_manage, get_project};
use crate::auth::Caller;
use crate::error::{HubError, HubResult};
use crate::store::{Collection, Document, DocumentStore};
use crate::types::ShowcaseProject;
use crate::youtube::{thumbnail_url, video_id_from_url};

pub const MAX_DEMO_VIDEO_BYTES: u64 = 80 * 1024 * 1024;
const UPLOAD_URL_TTL: Duration = Duration::from_secs(15 * 60);

static UNSAFE_SEGMENT_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9._-]").expect("segment pattern"));

/// Object storage for uploaded demo videos.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn presign_upload(&self, key: &str, content_type: &str, expires: Duration) -> HubResult<String>;
    async fn delete_object(&self, key: &str) -> HubResult<()>;
    fn public_url(&self, key: &str) -> String;
}

pub struct S3MediaStore {
    client: S3Client,
    bucket: String,
}

impl S3MediaStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn presign_upload(&self, key: &str, content_type: &str, expires: Duration) -> HubResult<String> {
        let config = PresigningConfig::expires_in(expires)
            .map_err(|e| HubError::Internal(format!("Invalid presign window: {}", e)))?;
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(config)
            .await
            .map_err(|e| HubError::Internal(format!("Failed to generate presigned URL: {}", e)))?;
        Ok(presigned.uri().to_string())
    }

    async fn delete_object(&self, key: &str) -> HubResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| HubError::Internal(format!("Failed to delete {}: {}", key, e)))?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{}", self.bucket, key)
    }
}

/// Replaces anything outside `[a-zA-Z0-9._-]` with `_`.
pub fn sanitize_segment(raw: &str) -> String {
    let cleaned = UNSAFE_SEGMENT_CHARS.replace_all(raw.trim(), "_").to_string();
    if cleaned.is_empty() {
        "anonymous".to_string()
    } else {
        cleaned
    }
}

/// `showcaseProjects/{projectId}/{maker}/demo-{epochMs}.{ext}`
pub fn demo_video_key(project_id: &str, maker: &str, file_name: &str, epoch_ms: i64) -> String {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| sanitize_segment(&ext.to_lowercase()))
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .unwrap_or_else(|| "mp4".to_string());
    format!(
        "showcaseProjects/{}/{}/demo-{}.{}",
        sanitize_segment(project_id),
        sanitize_segment(maker),
        epoch_ms,
        ext
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoUploadRequest {
    pub file_name: String,
    #[serde(default)]
    pub content_type: String,
    pub size: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoUpload {
    pub upload_url: String,
    pub storage_path: String,
    pub demo_video_url: String,
    pub expires_in: u64,
}

/// Presign a demo video upload and point the project at the new object. The previous object,
/// if any, is removed best-effort.
pub async fn request_demo_upload(
    store: &dyn DocumentStore,
    media: &dyn MediaStore,
    caller: &Caller,
    is_admin: bool,
    project_id: &str,
    request: DemoUploadRequest,
) -> HubResult<DemoUpload> {
    if request.size == 0 {
        return Err(HubError::bad_request("Video file is empty"));
    }
    if request.size > MAX_DEMO_VIDEO_BYTES {
        return Err(HubError::bad_request("Demo video must be 80 MB or smaller"));
    }
    let content_type = if request.content_type.trim().is_empty() {
        "video/mp4".to_string()
    } else {
        request.content_type.trim().to_string()
    };
    if !content_type.starts_with("video/") {
        return Err(HubError::bad_request("Demo upload must be a video"));
    }

    let project = get_project(store, project_id).await?;
    if !can_manage(&project, caller, is_admin) {
        return Err(HubError::forbidden("Only the maker or an admin can upload a demo video"));
    }

    let maker = if project.maker_id.is_empty() {
        caller.id().to_string()
    } else {
        project.maker_id.clone()
    };
    let key = demo_video_key(
        &project.id,
        &maker,
        &request.file_name,
        chrono::Utc::now().timestamp_millis(),
    );
    let upload_url = media.presign_upload(&key, &content_type, UPLOAD_URL_TTL).await?;
    let demo_video_url = media.public_url(&key);

    let mut patch = Document::new();
    patch.insert("demoVideoStoragePath".into(), Value::String(key.clone()));
    patch.insert("demoVideoUrl".into(), Value::String(demo_video_url.clone()));
    store
        .update(Collection::ShowcaseProjects, &project.id, patch)
        .await?;

    if !project.demo_video_storage_path.is_empty() && project.demo_video_storage_path != key {
        if let Err(e) = media.delete_object(&project.demo_video_storage_path).await {
            tracing::warn!("Could not remove previous demo video: {}", e);
        }
    }

    tracing::info!("Issued demo upload for project {} at {}", project.id, key);
    Ok(DemoUpload {
        upload_url,
        storage_path: key,
        demo_video_url,
        expires_in: UPLOAD_URL_TTL.as_secs(),
    })
}

/// `imageUrl`, else the thumbnail of a YouTube demo link.
pub fn preview_image_url(project: &ShowcaseProject) -> Option<String> {
    if !project.image_url.is_empty() {
        return Some(project.image_url.clone());
    }
    video_id_from_url(&project.demo_video_url).map(|id| thumbnail_url(&id))
}
