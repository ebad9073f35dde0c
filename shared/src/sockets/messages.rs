use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Incoming WebSocket message from a client.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    pub action: ClientAction,
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientAction {
    Subscribe,
    Unsubscribe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    /// From a DynamoDB stream event name.
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "INSERT" => Some(ChangeKind::Created),
            "MODIFY" => Some(ChangeKind::Updated),
            "REMOVE" => Some(ChangeKind::Deleted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// Message pushed to subscribed clients, e.g. `{"type":"showcaseComments_created", ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastMessage {
    pub r#type: String,
    pub topic: String,
    pub id: String,
    pub data: Value,
}

impl BroadcastMessage {
    pub fn new(message_type: impl Into<String>, topic: &str, id: &str, data: Value) -> Self {
        Self {
            r#type: message_type.into(),
            topic: topic.to_string(),
            id: id.to_string(),
            data,
        }
    }
}

/// Reply to a subscribe/unsubscribe request.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub ok: bool,
    pub topics: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_client_actions() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"action":"subscribe","topic":"quickShorts"}"#).unwrap();
        assert_eq!(msg.action, ClientAction::Subscribe);
        assert_eq!(msg.topic, "quickShorts");
        assert!(serde_json::from_str::<ClientMessage>(r#"{"action":"create_project"}"#).is_err());
    }

    #[test]
    fn broadcast_type_field() {
        let msg = BroadcastMessage::new("courses_deleted", "courses", "42", Value::Null);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "courses_deleted");
        assert_eq!(json["id"], "42");
    }
}
