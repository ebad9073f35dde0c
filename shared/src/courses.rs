use serde::Deserialize;
use serde_json::Value;

use crate::auth::Caller;
use crate::error::{HubError, HubResult};
use crate::showcase::normalize::{now_iso, timestamp_millis};
use crate::store::{Collection, DocumentStore, WriteMode};
use crate::types::{from_document, to_document, Course, UserCourse};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInput {
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub course_type: String,
    #[serde(default)]
    pub video_id: String,
    pub upload_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignCourseInput {
    pub video_id: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub uses: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub completed: bool,
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub async fn list_courses(store: &dyn DocumentStore) -> HubResult<Vec<Course>> {
    let mut courses = Vec::new();
    for snapshot in store.list(Collection::Courses).await? {
        match from_document::<Course>(snapshot.data) {
            Ok(mut course) => {
                if course.id.is_empty() {
                    course.id = snapshot.id;
                }
                courses.push(course);
            }
            Err(e) => tracing::warn!("Skipping malformed course {}: {}", snapshot.id, e),
        }
    }
    courses.sort_by_key(|c| {
        std::cmp::Reverse(c.created_at.as_deref().map(timestamp_millis).unwrap_or(0))
    });
    Ok(courses)
}

/// Create or merge a course. The id defaults to the current epoch milliseconds and the upload
/// date to today.
pub async fn save_course(store: &dyn DocumentStore, input: CourseInput) -> HubResult<Course> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(HubError::bad_request("Course name is required"));
    }

    let now = chrono::Utc::now();
    let id = non_empty(input.id).unwrap_or_else(|| now.timestamp_millis().to_string());
    let existing = store.get(Collection::Courses, &id).await?;
    let created_at = existing
        .as_ref()
        .and_then(|doc| doc.get("createdAt"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(now_iso);

    let course = Course {
        id: id.clone(),
        name,
        course_type: input.course_type.trim().to_string(),
        video_id: input.video_id.trim().to_string(),
        upload_date: non_empty(input.upload_date)
            .unwrap_or_else(|| now.format("%Y-%m-%d").to_string()),
        created_at: Some(created_at),
        updated_at: Some(now_iso()),
    };

    store
        .set(Collection::Courses, &id, to_document(&course)?, WriteMode::Merge)
        .await?;
    tracing::info!("Saved course {}", id);
    Ok(course)
}

pub async fn delete_course(store: &dyn DocumentStore, id: &str) -> HubResult<()> {
    store.delete(Collection::Courses, id).await?;
    tracing::info!("Deleted course {}", id);
    Ok(())
}

fn assignment_key(email: &str, video_id: &str) -> String {
    format!("{}_{}", email.trim().to_lowercase(), video_id.trim())
}

pub async fn assign_course(
    store: &dyn DocumentStore,
    caller: &Caller,
    input: AssignCourseInput,
) -> HubResult<UserCourse> {
    let video_id = input.video_id.trim().to_string();
    if video_id.is_empty() {
        return Err(HubError::bad_request("videoId is required"));
    }

    let key = assignment_key(&caller.email, &video_id);
    let assigned_at = store
        .get(Collection::UserCourses, &key)
        .await?
        .and_then(|doc| doc.get("assignedAt").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(now_iso);

    let assignment = UserCourse {
        email: caller.email.clone(),
        video_id,
        topic: input.topic,
        definition: input.definition,
        uses: input.uses,
        level: input.level,
        progress: input.progress.clamp(0.0, 100.0),
        completed: input.completed,
        assigned_at: Some(assigned_at),
    };

    store
        .set(Collection::UserCourses, &key, to_document(&assignment)?, WriteMode::Merge)
        .await?;
    Ok(assignment)
}

pub async fn list_user_courses(store: &dyn DocumentStore, email: &str) -> HubResult<Vec<UserCourse>> {
    let email = email.trim().to_lowercase();
    let mut out = Vec::new();
    for snapshot in store
        .find_by(Collection::UserCourses, "email", &Value::String(email))
        .await?
    {
        match from_document::<UserCourse>(snapshot.data) {
            Ok(course) => out.push(course),
            Err(e) => tracing::warn!("Skipping malformed assignment {}: {}", snapshot.id, e),
        }
    }
    out.sort_by(|a, b| a.assigned_at.cmp(&b.assigned_at));
    Ok(out)
}

pub async fn remove_user_course(store: &dyn DocumentStore, email: &str, video_id: &str) -> HubResult<()> {
    store
        .delete(Collection::UserCourses, &assignment_key(email, video_id))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn course_defaults_id_and_upload_date() {
        let store = InMemoryStore::new();
        let course = save_course(
            &store,
            CourseInput {
                id: None,
                name: " Intro to SQL ".into(),
                course_type: "video".into(),
                video_id: "abcdefghijk".into(),
                upload_date: None,
            },
        )
        .await
        .unwrap();

        assert!(course.id.parse::<i64>().is_ok());
        assert_eq!(course.name, "Intro to SQL");
        assert_eq!(course.upload_date.len(), 10);
        assert_eq!(list_courses(&store).await.unwrap().len(), 1);

        delete_course(&store, &course.id).await.unwrap();
        assert!(list_courses(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn course_requires_name() {
        let store = InMemoryStore::new();
        let err = save_course(
            &store,
            CourseInput {
                id: Some("1".into()),
                name: "  ".into(),
                course_type: String::new(),
                video_id: String::new(),
                upload_date: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HubError::BadRequest(_)));
    }

    #[tokio::test]
    async fn assignments_are_scoped_per_user() {
        let store = InMemoryStore::new();
        let me = Caller::new("me@oneorigin.us", "Me");
        let other = Caller::new("other@oneorigin.us", "Other");

        for (caller, video) in [(&me, "vid00000001"), (&me, "vid00000002"), (&other, "vid00000001")] {
            assign_course(
                &store,
                caller,
                AssignCourseInput {
                    video_id: video.into(),
                    topic: "SQL".into(),
                    definition: String::new(),
                    uses: String::new(),
                    level: "Beginner".into(),
                    progress: 150.0,
                    completed: false,
                },
            )
            .await
            .unwrap();
        }

        let mine = list_user_courses(&store, "me@oneorigin.us").await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|c| c.progress == 100.0));

        remove_user_course(&store, "me@oneorigin.us", "vid00000001").await.unwrap();
        assert_eq!(list_user_courses(&store, "me@oneorigin.us").await.unwrap().len(), 1);
        assert_eq!(list_user_courses(&store, "other@oneorigin.us").await.unwrap().len(), 1);
    }
}
