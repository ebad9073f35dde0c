use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::media::{preview_image_url, MediaStore};
use super::normalize::{new_id, normalize_project, now_iso, tags};
use super::ranking::{all_tags, filter_and_sort, FeedQuery};
use crate::auth::Caller;
use crate::error::{HubError, HubResult};
use crate::store::{Collection, Document, DocumentStore, StoreError, WriteMode};
use crate::types::{to_document, ShowcaseProject, ShowcaseUpvote};

const MIN_DESCRIPTION_CHARS: usize = 40;
const URL_FIELDS: [&str; 4] = ["demoUrl", "demoVideoUrl", "codeUrl", "imageUrl"];

/// Fields only the system writes.
const PROTECTED_FIELDS: [&str; 9] = [
    "id",
    "makerId",
    "makerEmail",
    "makerName",
    "createdAt",
    "upvotes",
    "commentsCount",
    "suggestionsCount",
    "demoVideoStoragePath",
];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateProjectInput {
    pub name: String,
    pub tagline: String,
    pub description: String,
    pub demo_url: String,
    pub demo_video_url: String,
    pub code_url: String,
    pub code_snippet: String,
    pub image_url: String,
    pub tags: Value,
}

/// A project as served to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: ShowcaseProject,
    pub preview_image_url: Option<String>,
}

impl From<ShowcaseProject> for ProjectView {
    fn from(project: ShowcaseProject) -> Self {
        let preview_image_url = preview_image_url(&project);
        Self {
            project,
            preview_image_url,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpvoteResult {
    pub upvotes: i64,
    pub upvoted: bool,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub project_id: String,
    pub comments_removed: usize,
    pub suggestions_removed: usize,
    pub upvotes_removed: usize,
    pub demo_video_removed: bool,
}

fn is_http_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

fn check_url(field: &str, raw: &str) -> HubResult<()> {
    let raw = raw.trim();
    if raw.is_empty() || is_http_url(raw) {
        Ok(())
    } else {
        Err(HubError::bad_request(format!("{} must be an http(s) URL", field)))
    }
}

pub fn validate_submission(input: &CreateProjectInput) -> HubResult<()> {
    if input.name.trim().is_empty() {
        return Err(HubError::bad_request("Project name is required"));
    }
    if input.tagline.trim().is_empty() {
        return Err(HubError::bad_request("Tagline is required"));
    }
    if input.description.trim().chars().count() < MIN_DESCRIPTION_CHARS {
        return Err(HubError::bad_request(format!(
            "Description must be at least {} characters",
            MIN_DESCRIPTION_CHARS
        )));
    }
    check_url("demoUrl", &input.demo_url)?;
    check_url("demoVideoUrl", &input.demo_video_url)?;
    check_url("codeUrl", &input.code_url)?;
    check_url("imageUrl", &input.image_url)?;
    if input.code_url.trim().is_empty() && input.code_snippet.trim().is_empty() {
        return Err(HubError::bad_request("Provide a code link or a code snippet"));
    }
    Ok(())
}

/// Owner (maker id or email, case-insensitive) or admin.
pub fn can_manage(project: &ShowcaseProject, caller: &Caller, is_admin: bool) -> bool {
    is_admin
        || (!project.maker_id.is_empty() && project.maker_id.eq_ignore_ascii_case(caller.id()))
        || (!project.maker_email.is_empty()
            && project.maker_email.eq_ignore_ascii_case(&caller.email))
}

fn with_id(id: &str, mut doc: Document) -> ShowcaseProject {
    if !doc.get("id").and_then(Value::as_str).is_some_and(|s| !s.trim().is_empty()) {
        doc.insert("id".into(), Value::String(id.to_string()));
    }
    normalize_project(&doc)
}

pub async fn create_project(
    store: &dyn DocumentStore,
    caller: &Caller,
    input: CreateProjectInput,
) -> HubResult<ShowcaseProject> {
    validate_submission(&input)?;

    let project = ShowcaseProject {
        id: new_id("p"),
        name: input.name.trim().to_string(),
        tagline: input.tagline.trim().to_string(),
        description: input.description.trim().to_string(),
        demo_url: input.demo_url.trim().to_string(),
        demo_video_url: input.demo_video_url.trim().to_string(),
        demo_video_storage_path: String::new(),
        code_url: input.code_url.trim().to_string(),
        code_snippet: input.code_snippet.trim().to_string(),
        image_url: input.image_url.trim().to_string(),
        tags: tags(Some(&input.tags)),
        maker_name: caller.display_name(),
        maker_email: caller.email.clone(),
        maker_id: caller.id().to_string(),
        created_at: now_iso(),
        upvotes: 0,
        comments_count: 0,
        suggestions_count: 0,
    };

    store
        .set(
            Collection::ShowcaseProjects,
            &project.id,
            to_document(&project)?,
            WriteMode::Replace,
        )
        .await?;
    tracing::info!("Created showcase project {} by {}", project.id, caller.email);
    Ok(project)
}

pub async fn get_project(store: &dyn DocumentStore, id: &str) -> HubResult<ShowcaseProject> {
    let doc = store
        .get(Collection::ShowcaseProjects, id)
        .await?
        .ok_or_else(|| HubError::not_found("Project not found"))?;
    Ok(with_id(id, doc))
}

pub async fn load_projects(store: &dyn DocumentStore) -> HubResult<Vec<ShowcaseProject>> {
    Ok(store
        .list(Collection::ShowcaseProjects)
        .await?
        .into_iter()
        .map(|snapshot| with_id(&snapshot.id, snapshot.data))
        .collect())
}

pub async fn list_projects(
    store: &dyn DocumentStore,
    query: &FeedQuery,
    now: DateTime<Utc>,
) -> HubResult<Vec<ProjectView>> {
    let projects = load_projects(store).await?;
    Ok(filter_and_sort(projects, query, now)
        .into_iter()
        .map(ProjectView::from)
        .collect())
}

pub async fn list_tags(store: &dyn DocumentStore) -> HubResult<Vec<String>> {
    Ok(all_tags(&load_projects(store).await?))
}

/// Patch editable fields. Protected fields in the patch are ignored.
pub async fn update_project(
    store: &dyn DocumentStore,
    caller: &Caller,
    is_admin: bool,
    id: &str,
    mut patch: Document,
) -> HubResult<ShowcaseProject> {
    let existing_doc = store
        .get(Collection::ShowcaseProjects, id)
        .await?
        .ok_or_else(|| HubError::not_found("Project not found"))?;
    let existing = with_id(id, existing_doc);
    if !can_manage(&existing, caller, is_admin) {
        return Err(HubError::forbidden("Only the maker or an admin can edit this project"));
    }

    for field in PROTECTED_FIELDS {
        patch.remove(field);
    }
    for field in URL_FIELDS {
        if let Some(value) = patch.get(field) {
            check_url(field, value.as_str().unwrap_or_default())?;
        }
    }
    for field in ["name", "tagline"] {
        if patch.contains_key(field)
            && patch.get(field).and_then(Value::as_str).map_or(true, |s| s.trim().is_empty())
        {
            return Err(HubError::bad_request(format!("{} cannot be empty", field)));
        }
    }

    if let Some(raw) = patch.get("tags") {
        let cleaned = tags(Some(raw));
        patch.insert("tags".into(), Value::from(cleaned));
    }

    // Patch only: counters are bumped concurrently by votes and comments.
    let merged = store
        .update(Collection::ShowcaseProjects, id, patch)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => HubError::not_found("Project not found"),
            other => other.into(),
        })?;
    tracing::info!("Updated showcase project {}", id);
    Ok(with_id(id, merged))
}

/// Delete a project with its comments, suggestions, upvote markers and demo video. The
/// cascade is best-effort.
pub async fn delete_project(
    store: &dyn DocumentStore,
    media: Option<&dyn MediaStore>,
    caller: &Caller,
    is_admin: bool,
    id: &str,
) -> HubResult<DeleteReport> {
    let project = get_project(store, id).await?;
    if !can_manage(&project, caller, is_admin) {
        return Err(HubError::forbidden("Only the maker or an admin can delete this project"));
    }

    store.delete(Collection::ShowcaseProjects, id).await?;

    let project_id = Value::String(id.to_string());
    let mut report = DeleteReport {
        project_id: id.to_string(),
        ..DeleteReport::default()
    };
    for (collection, slot) in [
        (Collection::ShowcaseComments, &mut report.comments_removed),
        (Collection::ShowcaseSuggestions, &mut report.suggestions_removed),
        (Collection::ShowcaseUpvotes, &mut report.upvotes_removed),
    ] {
        match store.delete_where(collection, "projectId", &project_id).await {
            Ok(count) => *slot = count,
            Err(e) => tracing::warn!("Cascade delete of {} for {} failed: {}", collection, id, e),
        }
    }

    if let (Some(media), false) = (media, project.demo_video_storage_path.is_empty()) {
        match media.delete_object(&project.demo_video_storage_path).await {
            Ok(()) => report.demo_video_removed = true,
            Err(e) => tracing::warn!("Demo video removal for {} failed: {}", id, e),
        }
    }

    tracing::info!(
        "Deleted showcase project {} ({} comments, {} suggestions, {} upvotes)",
        id,
        report.comments_removed,
        report.suggestions_removed,
        report.upvotes_removed
    );
    Ok(report)
}

fn upvote_key(user_id: &str, project_id: &str) -> String {
    format!("{}:{}", user_id, project_id)
}

/// Add the caller's upvote, or remove it when already present.
pub async fn toggle_upvote(
    store: &dyn DocumentStore,
    caller: &Caller,
    project_id: &str,
) -> HubResult<UpvoteResult> {
    get_project(store, project_id).await?;
    let key = upvote_key(caller.id(), project_id);

    let upvoted = store.get(Collection::ShowcaseUpvotes, &key).await?.is_none();
    let delta = if upvoted {
        let marker = ShowcaseUpvote {
            user_id: caller.id().to_string(),
            project_id: project_id.to_string(),
            created_at: now_iso(),
        };
        store
            .set(Collection::ShowcaseUpvotes, &key, to_document(&marker)?, WriteMode::Replace)
            .await?;
        1
    } else {
        store.delete(Collection::ShowcaseUpvotes, &key).await?;
        -1
    };

    let upvotes = store
        .increment(Collection::ShowcaseProjects, project_id, "upvotes", delta)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => HubError::not_found("Project not found"),
            other => other.into(),
        })?;
    Ok(UpvoteResult { upvotes, upvoted })
}
