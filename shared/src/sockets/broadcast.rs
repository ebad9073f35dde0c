use async_trait::async_trait;
use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use serde_json::Value;
use thiserror::Error;

use super::changes::DocumentChange;
use super::connections::{connections_for_topic, remove_connection};
use super::messages::BroadcastMessage;
use super::topics::topics_for_change;
use crate::error::HubResult;
use crate::store::DocumentStore;

#[derive(Debug, Error)]
pub enum PushError {
    /// The client disconnected without a `$disconnect`.
    #[error("connection is gone")]
    Gone,
    #[error("{0}")]
    Other(String),
}

/// Pushes a payload to one WebSocket connection.
#[async_trait]
pub trait ConnectionPusher: Send + Sync {
    async fn push(&self, connection_id: &str, payload: &[u8]) -> Result<(), PushError>;
}

#[async_trait]
impl ConnectionPusher for ApiGatewayManagementClient {
    async fn push(&self, connection_id: &str, payload: &[u8]) -> Result<(), PushError> {
        self.post_to_connection()
            .connection_id(connection_id)
            .data(payload.to_vec().into())
            .send()
            .await
            .map(|_| ())
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_gone_exception()) {
                    PushError::Gone
                } else {
                    PushError::Other(e.to_string())
                }
            })
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed: usize,
    pub pruned: usize,
}

/// Send `{collection}_{kind}` to every connection subscribed to one of the change's topics.
/// Gone connections are removed.
pub async fn broadcast_change(
    store: &dyn DocumentStore,
    pusher: &dyn ConnectionPusher,
    change: &DocumentChange,
) -> HubResult<BroadcastReport> {
    let mut report = BroadcastReport::default();
    let message_type = format!("{}_{}", change.collection, change.kind.as_str());
    let data = Value::Object(change.document.clone());

    for topic in topics_for_change(change.collection, &change.document) {
        let message = BroadcastMessage::new(message_type.as_str(), &topic, &change.id, data.clone());
        let payload = serde_json::to_vec(&message)?;
        let connections = connections_for_topic(store, &topic).await?;
        tracing::info!("Broadcasting {} to {} connections on {}", message_type, connections.len(), topic);

        for connection in connections {
            match pusher.push(&connection.connection_id, &payload).await {
                Ok(()) => report.sent += 1,
                Err(PushError::Gone) => {
                    tracing::info!("Pruning stale connection {}", connection.connection_id);
                    if let Err(e) = remove_connection(store, &connection.connection_id).await {
                        tracing::warn!("Failed to prune {}: {}", connection.connection_id, e);
                    }
                    report.pruned += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to send to connection {}: {}", connection.connection_id, e);
                    report.failed += 1;
                }
            }
        }
    }
    Ok(report)
}
