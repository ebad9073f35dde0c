use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::store::{Document, StoreError};

// ========== USER ==========
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        if raw.trim().eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub email: String,
    pub name: String,
    pub employee_id: String,
    pub role: Role,
    pub last_active: Option<String>,
    pub reset_assessment: bool,
    pub updated_at: Option<String>,
}

// ========== COURSES ==========
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Course {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub course_type: String,
    pub video_id: String,
    pub upload_date: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserCourse {
    pub email: String,
    pub video_id: String,
    pub topic: String,
    pub definition: String,
    pub uses: String,
    pub level: String,
    pub progress: f64,
    pub completed: bool,
    pub assigned_at: Option<String>,
}

// ========== ANNOUNCEMENTS ==========
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Announcement {
    pub id: String,
    pub text: String,
    pub date: String,
    pub created_at: Option<String>,
}

// ========== SHOWCASE ==========
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShowcaseProject {
    pub id: String,
    pub name: String,
    pub tagline: String,
    pub description: String,
    pub demo_url: String,
    pub demo_video_url: String,
    pub demo_video_storage_path: String,
    pub code_url: String,
    pub code_snippet: String,
    pub image_url: String,
    pub tags: Vec<String>,
    pub maker_name: String,
    pub maker_email: String,
    pub maker_id: String,
    pub created_at: String,
    pub upvotes: i64,
    pub comments_count: i64,
    pub suggestions_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShowcaseComment {
    pub id: String,
    pub project_id: String,
    pub parent_id: Option<String>,
    pub author_name: String,
    pub author_email: String,
    pub author_id: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShowcaseSuggestion {
    pub id: String,
    pub project_id: String,
    pub project_name: String,
    pub to_name: String,
    pub to_name_lower: String,
    pub from_name: String,
    pub from_email: String,
    pub from_id: String,
    pub created_at: String,
}

/// Marker document: `{userId}:{projectId}` exists while the user upvotes the project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShowcaseUpvote {
    pub user_id: String,
    pub project_id: String,
    pub created_at: String,
}

// ========== QUICK SHORTS ==========
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuickShort {
    pub video_id: String,
    pub title: String,
    pub topic: String,
    pub source_handle: String,
    pub embeddable: bool,
    pub added_at_ms: i64,
    pub added_by: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuickShortsSources {
    pub handles: Vec<String>,
    pub queries: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuickShortsMeta {
    pub updated_at_ms: i64,
    pub last_run_at_ms: i64,
    pub last_run_started_at_ms: i64,
    pub last_run_added_count: usize,
    pub sources_count: usize,
    pub queries_count: usize,
}

// ========== SOCKETS ==========
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Connection {
    pub connection_id: String,
    pub user_email: String,
    pub topics: Vec<String>,
    pub connected_at: String,
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(StoreError::Backend(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(serde_json::Value::Object(doc))?)
}
