use serde::Deserialize;
use serde_json::Value;

use crate::auth::{check_domain, Caller};
use crate::config::HubConfig;
use crate::error::{HubError, HubResult};
use crate::showcase::normalize::now_iso;
use crate::store::{Collection, Document, DocumentStore, StoreError, WriteMode};
use crate::types::{from_document, to_document, Role, User};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInput {
    pub email: String,
    pub name: Option<String>,
    pub employee_id: Option<String>,
    pub role: Option<Role>,
    pub reset_assessment: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub employee_id: Option<String>,
    pub role: Option<Role>,
    pub reset_assessment: Option<bool>,
}

impl UserPatch {
    fn into_document(self) -> Document {
        let mut doc = Document::new();
        if let Some(name) = self.name {
            doc.insert("name".into(), Value::String(name.trim().to_string()));
        }
        if let Some(employee_id) = self.employee_id {
            doc.insert("employeeId".into(), Value::String(employee_id.trim().to_string()));
        }
        if let Some(role) = self.role {
            let role = if role == Role::Admin { "Admin" } else { "User" };
            doc.insert("role".into(), Value::String(role.into()));
        }
        if let Some(flag) = self.reset_assessment {
            doc.insert("resetAssessment".into(), Value::Bool(flag));
        }
        doc.insert("updatedAt".into(), Value::String(now_iso()));
        doc
    }
}

fn key(email: &str) -> String {
    email.trim().to_lowercase()
}

fn auto_employee_id() -> String {
    format!("AUTO-{}", chrono::Utc::now().timestamp_millis())
}

/// Create the user on first login, otherwise refresh `lastActive`.
pub async fn record_login(
    store: &dyn DocumentStore,
    config: &HubConfig,
    caller: &Caller,
) -> HubResult<User> {
    check_domain(&caller.email, &config.allowed_email_domain)?;
    let email = key(&caller.email);
    let now = now_iso();

    if store.get(Collection::Users, &email).await?.is_none() {
        let user = User {
            email: email.clone(),
            name: caller.display_name(),
            employee_id: auto_employee_id(),
            role: if config.is_admin_email(&email) {
                Role::Admin
            } else {
                Role::User
            },
            last_active: Some(now.clone()),
            reset_assessment: false,
            updated_at: Some(now),
        };
        store
            .set(Collection::Users, &email, to_document(&user)?, WriteMode::Replace)
            .await?;
        tracing::info!("Created user {} on first login ({:?})", email, user.role);
        return Ok(user);
    }

    let mut patch = Document::new();
    patch.insert("lastActive".into(), Value::String(now));
    let merged = store.update(Collection::Users, &email, patch).await?;
    Ok(from_document(merged)?)
}

pub async fn get_user(store: &dyn DocumentStore, email: &str) -> HubResult<User> {
    let doc = store
        .get(Collection::Users, &key(email))
        .await?
        .ok_or_else(|| HubError::not_found("User not found"))?;
    Ok(from_document(doc)?)
}

pub async fn list_users(store: &dyn DocumentStore) -> HubResult<Vec<User>> {
    let mut users = Vec::new();
    for snapshot in store.list(Collection::Users).await? {
        match from_document::<User>(snapshot.data) {
            Ok(mut user) => {
                if user.email.is_empty() {
                    user.email = snapshot.id;
                }
                users.push(user);
            }
            Err(e) => tracing::warn!("Skipping malformed user {}: {}", snapshot.id, e),
        }
    }
    users.sort_by(|a, b| a.email.cmp(&b.email));
    Ok(users)
}

/// Admin create-or-merge.
pub async fn save_user(store: &dyn DocumentStore, input: UserInput) -> HubResult<User> {
    let email = key(&input.email);
    if email.is_empty() || !email.contains('@') {
        return Err(HubError::bad_request("A valid email is required"));
    }

    let existing = store.get(Collection::Users, &email).await?;
    let mut doc = UserPatch {
        name: input.name,
        employee_id: input.employee_id,
        role: input.role,
        reset_assessment: input.reset_assessment,
    }
    .into_document();
    doc.insert("email".into(), Value::String(email.clone()));

    if existing.is_none() {
        doc.entry("employeeId")
            .or_insert_with(|| Value::String(auto_employee_id()));
        doc.entry("role").or_insert_with(|| Value::String("User".into()));
        doc.entry("name").or_insert_with(|| {
            Value::String(email.split('@').next().unwrap_or_default().to_string())
        });
    }

    store
        .set(Collection::Users, &email, doc, WriteMode::Merge)
        .await?;
    get_user(store, &email).await
}

pub async fn update_user(store: &dyn DocumentStore, email: &str, patch: UserPatch) -> HubResult<User> {
    let merged = store
        .update(Collection::Users, &key(email), patch.into_document())
        .await
        .map_err(|e| match e {
            StoreError::NotFound => HubError::not_found("User not found"),
            other => other.into(),
        })?;
    Ok(from_document(merged)?)
}

pub async fn delete_user(store: &dyn DocumentStore, email: &str) -> HubResult<()> {
    store.delete(Collection::Users, &key(email)).await?;
    tracing::info!("Deleted user {}", key(email));
    Ok(())
}

pub async fn delete_users(store: &dyn DocumentStore, emails: &[String]) -> HubResult<usize> {
    let mut deleted = 0;
    for email in emails.iter().map(|e| key(e)).filter(|e| !e.is_empty()) {
        store.delete(Collection::Users, &email).await?;
        deleted += 1;
    }
    tracing::info!("Batch deleted {} users", deleted);
    Ok(deleted)
}

/// Configured admin addresses, or a stored `Admin` role.
pub async fn is_admin(store: &dyn DocumentStore, config: &HubConfig, email: &str) -> HubResult<bool> {
    if config.is_admin_email(email) {
        return Ok(true);
    }
    Ok(store
        .get(Collection::Users, &key(email))
        .await?
        .and_then(|doc| doc.get("role").and_then(Value::as_str).map(str::to_string))
        .map(|role| Role::from(role) == Role::Admin)
        .unwrap_or(false))
}

pub async fn require_admin(
    store: &dyn DocumentStore,
    config: &HubConfig,
    caller: &Caller,
) -> HubResult<()> {
    if is_admin(store, config, &caller.email).await? {
        Ok(())
    } else {
        Err(HubError::forbidden("Admin access required"))
    }
}
