use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::normalize::{new_id, normalize_comment, now_iso, timestamp_millis};
use super::projects::get_project;
use super::thread::{build_thread_tree, ThreadNode};
use crate::auth::Caller;
use crate::error::{HubError, HubResult};
use crate::store::{Collection, DocumentStore, WriteMode};
use crate::types::{to_document, ShowcaseComment};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentInput {
    #[serde(default)]
    pub body: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentListing {
    pub comments: Vec<ShowcaseComment>,
    pub thread: Vec<ThreadNode>,
}

/// Flat comments, oldest first, plus the nested thread.
pub async fn list_comments(store: &dyn DocumentStore, project_id: &str) -> HubResult<CommentListing> {
    let mut comments: Vec<ShowcaseComment> = store
        .find_by(
            Collection::ShowcaseComments,
            "projectId",
            &Value::String(project_id.to_string()),
        )
        .await?
        .into_iter()
        .map(|snapshot| {
            let mut comment = normalize_comment(&snapshot.data);
            if snapshot.data.get("id").and_then(Value::as_str).is_none() {
                comment.id = snapshot.id;
            }
            comment
        })
        .collect();
    comments.sort_by_key(|c| timestamp_millis(&c.created_at));

    let thread = build_thread_tree(&comments);
    Ok(CommentListing { comments, thread })
}

pub async fn add_comment(
    store: &dyn DocumentStore,
    caller: &Caller,
    project_id: &str,
    input: CommentInput,
) -> HubResult<ShowcaseComment> {
    let body = input.body.trim().to_string();
    if body.is_empty() {
        return Err(HubError::bad_request("Comment cannot be empty"));
    }
    get_project(store, project_id).await?;

    let comment = ShowcaseComment {
        id: new_id("c"),
        project_id: project_id.to_string(),
        parent_id: input
            .parent_id
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        author_name: caller.display_name(),
        author_email: caller.email.clone(),
        author_id: caller.id().to_string(),
        body,
        created_at: now_iso(),
    };
    store
        .set(
            Collection::ShowcaseComments,
            &comment.id,
            to_document(&comment)?,
            WriteMode::Replace,
        )
        .await?;

    if let Err(e) = store
        .increment(Collection::ShowcaseProjects, project_id, "commentsCount", 1)
        .await
    {
        tracing::warn!("Could not bump commentsCount for {}: {}", project_id, e);
    }
    tracing::info!("Comment {} added to {}", comment.id, project_id);
    Ok(comment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::showcase::projects::{create_project, CreateProjectInput};
    use crate::store::InMemoryStore;

    async fn project(store: &InMemoryStore) -> String {
        create_project(
            store,
            &Caller::new("maker@oneorigin.us", "Maker"),
            CreateProjectInput {
                name: "Tool".into(),
                tagline: "Does things".into(),
                description: "x".repeat(45),
                code_snippet: "print('hi')".into(),
                ..CreateProjectInput::default()
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn replies_nest_and_counter_bumps() {
        let store = InMemoryStore::new();
        let pid = project(&store).await;
        let caller = Caller::new("fan@oneorigin.us", "");

        let root = add_comment(&store, &caller, &pid, CommentInput { body: "First".into(), parent_id: None })
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        add_comment(
            &store,
            &caller,
            &pid,
            CommentInput {
                body: "Reply".into(),
                parent_id: Some(root.id.clone()),
            },
        )
        .await
        .unwrap();

        let listing = list_comments(&store, &pid).await.unwrap();
        assert_eq!(listing.comments.len(), 2);
        assert_eq!(listing.thread.len(), 1);
        assert_eq!(listing.thread[0].replies.len(), 1);
        assert_eq!(listing.comments[0].author_name, "fan");

        let stored = get_project(&store, &pid).await.unwrap();
        assert_eq!(stored.comments_count, 2);
    }

    #[tokio::test]
    async fn empty_body_rejected() {
        let store = InMemoryStore::new();
        let pid = project(&store).await;
        let err = add_comment(
            &store,
            &Caller::new("fan@oneorigin.us", ""),
            &pid,
            CommentInput { body: "   ".into(), parent_id: None },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HubError::BadRequest(_)));
    }

    #[tokio::test]
    async fn comment_on_missing_project_is_not_found() {
        let store = InMemoryStore::new();
        let err = add_comment(
            &store,
            &Caller::new("fan@oneorigin.us", ""),
            "p-gone",
            CommentInput { body: "hi".into(), parent_id: None },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HubError::NotFound(_)));
    }
}
