use std::sync::Arc;

use lambda_http::request::RequestContext;
use lambda_http::{http::StatusCode, Body, Error, Request, RequestExt, Response};

use super::connections::{remove_connection, save_connection, subscribe, unsubscribe};
use super::messages::{Ack, ClientAction, ClientMessage};
use super::topics::is_valid_topic;
use crate::auth::require_caller;
use crate::error::{HubError, HubResult};
use crate::{response, AppState};

/// Connection id and route key of a WebSocket event.
pub fn websocket_route(event: &Request) -> Option<(String, String)> {
    if let Some(RequestContext::WebSocket(ctx)) = event.request_context_ref() {
        if let (Some(id), Some(route)) = (ctx.connection_id.clone(), ctx.route_key.clone()) {
            return Some((id, route));
        }
    }
    let header = |key: &str| {
        event
            .headers()
            .get(key)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Some((header("connectionid")?, header("routekey")?))
}

/// Handle WebSocket events ($connect, $disconnect, $default)
pub async fn handle_websocket_event(
    event: Request,
    state: Arc<AppState>,
    connection_id: &str,
    route_key: &str,
) -> Result<Response<Body>, Error> {
    tracing::info!("WebSocket event: {} for connection: {}", route_key, connection_id);

    let result = match route_key {
        "$connect" => handle_connect(&event, &state, connection_id).await,
        "$disconnect" => remove_connection(state.store.as_ref(), connection_id)
            .await
            .map(|()| Ack { ok: true, topics: Vec::new() }),
        "$default" => handle_message(&event, &state, connection_id).await,
        _ => {
            tracing::warn!("Unknown WebSocket route: {}", route_key);
            Err(HubError::bad_request(format!("Unknown route: {}", route_key)))
        }
    };

    match result {
        Ok(ack) => response::json(StatusCode::OK, &ack),
        Err(e) => e.into_response(),
    }
}

async fn handle_connect(event: &Request, state: &AppState, connection_id: &str) -> HubResult<Ack> {
    let caller = require_caller(event, &state.config)?;
    let topic = event
        .query_string_parameters_ref()
        .and_then(|params| params.first("topic"))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(topic) = topic {
        if !is_valid_topic(topic) {
            return Err(HubError::bad_request(format!("Unknown topic: {}", topic)));
        }
    }

    let connection = save_connection(state.store.as_ref(), connection_id, &caller.email, topic).await?;
    Ok(Ack {
        ok: true,
        topics: connection.topics,
    })
}

async fn handle_message(event: &Request, state: &AppState, connection_id: &str) -> HubResult<Ack> {
    let message: ClientMessage = serde_json::from_slice(event.body())
        .map_err(|e| HubError::bad_request(format!("Invalid message format: {}", e)))?;
    let topic = message.topic.trim();
    if !is_valid_topic(topic) {
        return Err(HubError::bad_request(format!("Unknown topic: {}", topic)));
    }

    let topics = match message.action {
        ClientAction::Subscribe => subscribe(state.store.as_ref(), connection_id, topic).await?,
        ClientAction::Unsubscribe => unsubscribe(state.store.as_ref(), connection_id, topic).await?,
    };
    tracing::info!("{} is now subscribed to {:?}", connection_id, topics);
    Ok(Ack { ok: true, topics })
}
