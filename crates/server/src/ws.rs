// crates/server/src/ws.rs
//! WebSocket transport for job events.
//!
//! Clients join and leave resource scopes with small JSON messages:
//!
//! ```text
//! -> {"type":"join","resourceId":"proj-1"}
//! <- {"type":"joined","resourceId":"proj-1"}
//! <- {"type":"event","channel":"build_progress","kind":"job_progress","job":{...},...}
//! -> {"type":"leave","resourceId":"proj-1"}
//! <- {"type":"left","resourceId":"proj-1"}
//! ```
//!
//! Closing the socket leaves every scope the connection joined.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use game_builder_jobs::{
    DeliveryError, EventSink, JobEvent, ResourceId, Subscriber, SubscriberId,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Join {
        #[serde(rename = "resourceId")]
        resource_id: String,
    },
    Leave {
        #[serde(rename = "resourceId")]
        resource_id: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage<'a> {
    Joined {
        #[serde(rename = "resourceId")]
        resource_id: &'a str,
    },
    Left {
        #[serde(rename = "resourceId")]
        resource_id: &'a str,
    },
    Error {
        message: String,
    },
    Event(&'a JobEvent),
}

const ENCODE_FAILED: &str = r#"{"type":"error","message":"encoding failed"}"#;

fn encode(message: &ServerMessage<'_>) -> String {
    serde_json::to_string(message).unwrap_or_else(|e| {
        warn!(error = %e, "failed to encode websocket message");
        ENCODE_FAILED.to_string()
    })
}

/// Queues encoded events on the connection's outgoing channel.
struct WsSink {
    tx: mpsc::UnboundedSender<String>,
}

impl EventSink for WsSink {
    fn deliver(&self, event: &JobEvent) -> Result<(), DeliveryError> {
        self.tx
            .send(encode(&ServerMessage::Event(event)))
            .map_err(|_| DeliveryError::Closed)
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();

    // Replies and events share one queue so a client sees `joined` before
    // any event of that scope.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let subscriber = Subscriber::new(SubscriberId::new(), Arc::new(WsSink { tx: tx.clone() }));
    let subscriber_id = subscriber.id();
    info!(subscriber_id = %subscriber_id, "websocket connected");

    let forward_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => {
                let reply = handle_client_message(&state, &subscriber, text.as_str());
                if tx.send(reply).is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Cleanup
    state.jobs.router().leave_all(subscriber_id);
    forward_task.abort();
    info!(subscriber_id = %subscriber_id, "websocket disconnected");
}

fn handle_client_message(state: &AppState, subscriber: &Subscriber, text: &str) -> String {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            return encode(&ServerMessage::Error {
                message: format!("invalid message: {e}"),
            })
        }
    };

    let router = state.jobs.router();
    match message {
        ClientMessage::Join { resource_id } => match ResourceId::new(resource_id) {
            Ok(resource_id) => {
                router.join(&resource_id, subscriber.clone());
                encode(&ServerMessage::Joined {
                    resource_id: resource_id.as_str(),
                })
            }
            Err(e) => encode(&ServerMessage::Error {
                message: e.to_string(),
            }),
        },
        ClientMessage::Leave { resource_id } => match ResourceId::new(resource_id) {
            Ok(resource_id) => {
                router.leave(&resource_id, subscriber.id());
                encode(&ServerMessage::Left {
                    resource_id: resource_id.as_str(),
                })
            }
            Err(e) => encode(&ServerMessage::Error {
                message: e.to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_builder_jobs::{Job, JobKind};
    use serde_json::{json, Value};

    #[test]
    fn test_client_message_parsing() {
        let join: ClientMessage =
            serde_json::from_str(r#"{"type":"join","resourceId":"p1"}"#).unwrap();
        assert!(matches!(join, ClientMessage::Join { resource_id } if resource_id == "p1"));
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"subscribe"}"#).is_err());
    }

    #[test]
    fn test_event_message_flattens_job_event() {
        let job = Job::new(ResourceId::new("p1").unwrap(), JobKind::Build, json!({}));
        let event = JobEvent::finished(&job);
        let encoded: Value = serde_json::from_str(&encode(&ServerMessage::Event(&event))).unwrap();

        assert_eq!(encoded["type"], "event");
        assert_eq!(encoded["channel"], "build_progress");
        assert_eq!(encoded["kind"], "job_failed");
        assert_eq!(encoded["job"]["resourceId"], "p1");
    }

    #[test]
    fn test_ack_shape() {
        let encoded = encode(&ServerMessage::Joined { resource_id: "p1" });
        assert_eq!(encoded, r#"{"type":"joined","resourceId":"p1"}"#);
    }
}
