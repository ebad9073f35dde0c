use serde_json::Value;

use crate::error::{HubError, HubResult};
use crate::showcase::normalize::now_iso;
use crate::store::{Collection, Document, DocumentStore, WriteMode};
use crate::types::{from_document, to_document, Connection};

/// Register a WebSocket connection, optionally subscribed to one topic from the start.
pub async fn save_connection(
    store: &dyn DocumentStore,
    connection_id: &str,
    user_email: &str,
    topic: Option<&str>,
) -> HubResult<Connection> {
    let connection = Connection {
        connection_id: connection_id.to_string(),
        user_email: user_email.to_string(),
        topics: topic.map(|t| vec![t.to_string()]).unwrap_or_default(),
        connected_at: now_iso(),
    };
    store
        .set(
            Collection::WsConnections,
            connection_id,
            to_document(&connection)?,
            WriteMode::Replace,
        )
        .await?;
    tracing::info!("Connection saved: {} (user: {})", connection_id, user_email);
    Ok(connection)
}

pub async fn remove_connection(store: &dyn DocumentStore, connection_id: &str) -> HubResult<()> {
    store.delete(Collection::WsConnections, connection_id).await?;
    tracing::info!("Connection removed: {}", connection_id);
    Ok(())
}

async fn set_topics(
    store: &dyn DocumentStore,
    connection_id: &str,
    edit: impl FnOnce(&mut Vec<String>),
) -> HubResult<Vec<String>> {
    let doc = store
        .get(Collection::WsConnections, connection_id)
        .await?
        .ok_or_else(|| HubError::not_found("Unknown connection"))?;
    let mut connection: Connection = from_document(doc)?;
    edit(&mut connection.topics);

    let mut patch = Document::new();
    patch.insert(
        "topics".into(),
        Value::Array(connection.topics.iter().cloned().map(Value::String).collect()),
    );
    store
        .set(Collection::WsConnections, connection_id, patch, WriteMode::Merge)
        .await?;
    Ok(connection.topics)
}

pub async fn subscribe(store: &dyn DocumentStore, connection_id: &str, topic: &str) -> HubResult<Vec<String>> {
    set_topics(store, connection_id, |topics| {
        if !topics.iter().any(|t| t == topic) {
            topics.push(topic.to_string());
        }
    })
    .await
}

pub async fn unsubscribe(store: &dyn DocumentStore, connection_id: &str, topic: &str) -> HubResult<Vec<String>> {
    set_topics(store, connection_id, |topics| topics.retain(|t| t != topic)).await
}

/// Connections subscribed to `topic`.
pub async fn connections_for_topic(store: &dyn DocumentStore, topic: &str) -> HubResult<Vec<Connection>> {
    let mut out = Vec::new();
    for snapshot in store.list(Collection::WsConnections).await? {
        match from_document::<Connection>(snapshot.data) {
            Ok(connection) if connection.topics.iter().any(|t| t == topic) => out.push(connection),
            Ok(_) => {}
            Err(e) => tracing::warn!("Skipping malformed connection {}: {}", snapshot.id, e),
        }
    }
    Ok(out)
}
