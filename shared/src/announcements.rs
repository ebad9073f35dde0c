use serde::Deserialize;

use crate::error::{HubError, HubResult};
use crate::showcase::normalize::{now_iso, timestamp_millis};
use crate::store::{Collection, DocumentStore, WriteMode};
use crate::types::{from_document, to_document, Announcement};

#[derive(Debug, Deserialize)]
pub struct AnnouncementInput {
    pub text: String,
    pub date: Option<String>,
}

/// Newest first.
pub async fn list_announcements(store: &dyn DocumentStore) -> HubResult<Vec<Announcement>> {
    let mut out = Vec::new();
    for snapshot in store.list(Collection::Announcements).await? {
        match from_document::<Announcement>(snapshot.data) {
            Ok(mut announcement) => {
                if announcement.id.is_empty() {
                    announcement.id = snapshot.id;
                }
                out.push(announcement);
            }
            Err(e) => tracing::warn!("Skipping malformed announcement {}: {}", snapshot.id, e),
        }
    }
    out.sort_by_key(|a| {
        std::cmp::Reverse(a.created_at.as_deref().map(timestamp_millis).unwrap_or(0))
    });
    Ok(out)
}

pub async fn create_announcement(
    store: &dyn DocumentStore,
    input: AnnouncementInput,
) -> HubResult<Announcement> {
    let text = input.text.trim().to_string();
    if text.is_empty() {
        return Err(HubError::bad_request("Announcement text is required"));
    }

    let now = chrono::Utc::now();
    let announcement = Announcement {
        id: now.timestamp_millis().to_string(),
        text,
        date: input
            .date
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| now.format("%Y-%m-%d").to_string()),
        created_at: Some(now_iso()),
    };

    store
        .set(
            Collection::Announcements,
            &announcement.id,
            to_document(&announcement)?,
            WriteMode::Replace,
        )
        .await?;
    tracing::info!("Created announcement {}", announcement.id);
    Ok(announcement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn lists_newest_first() {
        let store = InMemoryStore::new();
        for (id, at) in [("1", "2024-01-01T00:00:00.000Z"), ("2", "2024-03-01T00:00:00.000Z")] {
            let doc = match json!({"id": id, "text": "t", "date": "d", "createdAt": at}) {
                serde_json::Value::Object(map) => map,
                _ => unreachable!(),
            };
            store
                .set(Collection::Announcements, id, doc, WriteMode::Replace)
                .await
                .unwrap();
        }
        let listed = list_announcements(&store).await.unwrap();
        assert_eq!(listed[0].id, "2");
        assert_eq!(listed[1].id, "1");
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let store = InMemoryStore::new();
        let err = create_announcement(&store, AnnouncementInput { text: " ".into(), date: None })
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::BadRequest(_)));
    }

    #[tokio::test]
    async fn create_defaults_date() {
        let store = InMemoryStore::new();
        let created = create_announcement(&store, AnnouncementInput { text: "Hello".into(), date: None })
            .await
            .unwrap();
        assert_eq!(created.date.len(), 10);
        assert_eq!(list_announcements(&store).await.unwrap().len(), 1);
    }
}
