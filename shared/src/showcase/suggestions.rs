use serde::Deserialize;
use serde_json::Value;

use super::normalize::{new_id, normalize_suggestion, now_iso, timestamp_millis};
use super::projects::get_project;
use crate::auth::Caller;
use crate::error::{HubError, HubResult};
use crate::store::{Collection, DocumentStore, WriteMode};
use crate::types::{to_document, ShowcaseSuggestion};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionInput {
    #[serde(default)]
    pub to_name: String,
}

/// Suggest a project to a named colleague.
pub async fn add_suggestion(
    store: &dyn DocumentStore,
    caller: &Caller,
    project_id: &str,
    input: SuggestionInput,
) -> HubResult<ShowcaseSuggestion> {
    let to_name = input.to_name.split_whitespace().collect::<Vec<_>>().join(" ");
    if to_name.is_empty() {
        return Err(HubError::bad_request("Recipient name is required"));
    }
    let project = get_project(store, project_id).await?;

    let suggestion = ShowcaseSuggestion {
        id: new_id("s"),
        project_id: project.id.clone(),
        project_name: project.name,
        to_name_lower: to_name.to_lowercase(),
        to_name,
        from_name: caller.display_name(),
        from_email: caller.email.clone(),
        from_id: caller.id().to_string(),
        created_at: now_iso(),
    };
    store
        .set(
            Collection::ShowcaseSuggestions,
            &suggestion.id,
            to_document(&suggestion)?,
            WriteMode::Replace,
        )
        .await?;

    if let Err(e) = store
        .increment(Collection::ShowcaseProjects, project_id, "suggestionsCount", 1)
        .await
    {
        tracing::warn!("Could not bump suggestionsCount for {}: {}", project_id, e);
    }
    tracing::info!("Suggested {} to {}", project_id, suggestion.to_name);
    Ok(suggestion)
}

/// Suggestions addressed to `to_name` (case-insensitive), newest first.
pub async fn list_for_recipient(
    store: &dyn DocumentStore,
    to_name: &str,
) -> HubResult<Vec<ShowcaseSuggestion>> {
    let key = to_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if key.is_empty() {
        return Err(HubError::bad_request("Recipient name is required"));
    }

    let mut out: Vec<ShowcaseSuggestion> = store
        .find_by(Collection::ShowcaseSuggestions, "toNameLower", &Value::String(key))
        .await?
        .into_iter()
        .map(|snapshot| normalize_suggestion(&snapshot.data))
        .collect();
    out.sort_by_key(|s| std::cmp::Reverse(timestamp_millis(&s.created_at)));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::showcase::projects::{create_project, CreateProjectInput};
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn suggestions_are_found_case_insensitively() {
        let store = InMemoryStore::new();
        let project = create_project(
            &store,
            &Caller::new("maker@oneorigin.us", "Maker"),
            CreateProjectInput {
                name: "Tool".into(),
                tagline: "Does things".into(),
                description: "y".repeat(40),
                code_url: "https://git.test/tool".into(),
                ..CreateProjectInput::default()
            },
        )
        .await
        .unwrap();
        let fan = Caller::new("fan@oneorigin.us", "Fan");

        let created = add_suggestion(&store, &fan, &project.id, SuggestionInput { to_name: " Priya   Shah ".into() })
            .await
            .unwrap();
        assert_eq!(created.to_name, "Priya Shah");
        assert_eq!(created.project_name, "Tool");

        let found = list_for_recipient(&store, "PRIYA SHAH").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].from_name, "Fan");
        assert!(list_for_recipient(&store, "someone else").await.unwrap().is_empty());

        assert_eq!(get_project(&store, &project.id).await.unwrap().suggestions_count, 1);
    }

    #[tokio::test]
    async fn recipient_required() {
        let store = InMemoryStore::new();
        let err = add_suggestion(
            &store,
            &Caller::new("fan@oneorigin.us", ""),
            "p1",
            SuggestionInput { to_name: "  ".into() },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HubError::BadRequest(_)));
    }
}
