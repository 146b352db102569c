//! WebSocket server for live bartr updates
//!
//! Every successful mutation of a bartr is published as a `BartrEvent`.
//! A connection only ever receives events for trades its user is a party
//! to, optionally narrowed to the bartr ids it subscribed to.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use crate::bartr::BartrEvent;
use crate::middleware::AuthenticatedUser;

/// WebSocket server state
#[derive(Clone)]
pub struct WsState {
    tx: broadcast::Sender<BartrEvent>,
    clients: Arc<RwLock<HashMap<Uuid, ClientInfo>>>,
}

/// Client connection information
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub user_id: Uuid,
    /// Empty means every bartr of the user
    pub subscribed_bartrs: HashSet<Uuid>,
}

impl ClientInfo {
    fn wants(&self, event: &BartrEvent) -> bool {
        event.concerns(self.user_id)
            && (self.subscribed_bartrs.is_empty()
                || self.subscribed_bartrs.contains(&event.bartr_id))
    }
}

/// Client message types
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Subscribe { bartr_ids: Vec<Uuid> },
    #[serde(rename_all = "camelCase")]
    Unsubscribe { bartr_ids: Vec<Uuid> },
    Ping,
}

/// Server message types
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ServerMessage {
    Event { event: BartrEvent },
    #[serde(rename_all = "camelCase")]
    Subscribed { bartr_ids: Vec<Uuid> },
    #[serde(rename_all = "camelCase")]
    Unsubscribed { bartr_ids: Vec<Uuid> },
    Pong,
    Error { message: String },
}

impl Default for WsState {
    fn default() -> Self {
        Self::new()
    }
}

impl WsState {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            tx,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Publish a bartr change to connected clients
    pub fn publish(&self, event: BartrEvent) {
        // Err only means nobody is connected
        if self.tx.send(event).is_err() {
            tracing::trace!("No live subscribers for bartr event");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BartrEvent> {
        self.tx.subscribe()
    }

    pub async fn connected_clients(&self) -> usize {
        self.clients.read().await.len()
    }

    async fn register_client(&self, connection_id: Uuid, user_id: Uuid) {
        self.clients.write().await.insert(
            connection_id,
            ClientInfo {
                user_id,
                subscribed_bartrs: HashSet::new(),
            },
        );
        tracing::info!(user_id = %user_id, "Live client connected");
    }

    async fn unregister_client(&self, connection_id: &Uuid) {
        if let Some(client) = self.clients.write().await.remove(connection_id) {
            tracing::info!(user_id = %client.user_id, "Live client disconnected");
        }
    }

    async fn wants(&self, connection_id: &Uuid, event: &BartrEvent) -> bool {
        self.clients
            .read()
            .await
            .get(connection_id)
            .map(|client| client.wants(event))
            .unwrap_or(false)
    }

    async fn update_subscriptions(&self, connection_id: &Uuid, add: &[Uuid], remove: &[Uuid]) {
        if let Some(client) = self.clients.write().await.get_mut(connection_id) {
            client.subscribed_bartrs.extend(add.iter().copied());
            for id in remove {
                client.subscribed_bartrs.remove(id);
            }
        }
    }
}

/// WebSocket handler - upgrades an authenticated HTTP connection
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    user: AuthenticatedUser,
    State(state): State<WsState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user.user_id))
}

async fn handle_socket(socket: WebSocket, state: WsState, user_id: Uuid) {
    let connection_id = Uuid::new_v4();
    state.register_client(connection_id, user_id).await;

    let (mut sender, mut receiver) = socket.split();
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMessage>(32);
    let mut events = state.subscribe();

    let send_state = state.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let outgoing = tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        if !send_state.wants(&connection_id, &event).await {
                            continue;
                        }
                        ServerMessage::Event { event }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Live client lagging, events dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(reply) = reply_rx.recv() => reply,
                else => break,
            };

            let Ok(text) = serde_json::to_string(&outgoing) else {
                continue;
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let reply = match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Subscribe { bartr_ids }) => {
                    recv_state
                        .update_subscriptions(&connection_id, &bartr_ids, &[])
                        .await;
                    ServerMessage::Subscribed { bartr_ids }
                }
                Ok(ClientMessage::Unsubscribe { bartr_ids }) => {
                    recv_state
                        .update_subscriptions(&connection_id, &[], &bartr_ids)
                        .await;
                    ServerMessage::Unsubscribed { bartr_ids }
                }
                Ok(ClientMessage::Ping) => ServerMessage::Pong,
                Err(e) => ServerMessage::Error {
                    message: format!("Unrecognized message: {}", e),
                },
            };

            if reply_tx.send(reply).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.unregister_client(&connection_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bartr::{BartrEventKind, BartrStatus};
    use chrono::Utc;

    fn event(initiator_id: Uuid, receiver_id: Uuid) -> BartrEvent {
        BartrEvent {
            kind: BartrEventKind::Accepted,
            bartr_id: Uuid::new_v4(),
            initiator_id,
            receiver_id,
            status: BartrStatus::Accepted,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_client_only_sees_own_trades() {
        let user_id = Uuid::new_v4();
        let client = ClientInfo {
            user_id,
            subscribed_bartrs: HashSet::new(),
        };

        assert!(client.wants(&event(user_id, Uuid::new_v4())));
        assert!(client.wants(&event(Uuid::new_v4(), user_id)));
        assert!(!client.wants(&event(Uuid::new_v4(), Uuid::new_v4())));
    }

    #[test]
    fn test_subscriptions_narrow_delivery() {
        let user_id = Uuid::new_v4();
        let watched = event(user_id, Uuid::new_v4());
        let other = event(user_id, Uuid::new_v4());
        let client = ClientInfo {
            user_id,
            subscribed_bartrs: HashSet::from([watched.bartr_id]),
        };

        assert!(client.wants(&watched));
        assert!(!client.wants(&other));
    }

    #[test]
    fn test_client_message_format() {
        let id = Uuid::new_v4();
        let msg: ClientMessage =
            serde_json::from_str(&format!(r#"{{"type":"subscribe","bartrIds":["{}"]}}"#, id))
                .unwrap();
        assert!(matches!(msg, ClientMessage::Subscribe { bartr_ids } if bartr_ids == vec![id]));

        let pong = serde_json::to_value(ServerMessage::Pong).unwrap();
        assert_eq!(pong["type"], "pong");
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let state = WsState::new();
        let mut rx = state.subscribe();
        let sent = event(Uuid::new_v4(), Uuid::new_v4());

        state.publish(sent.clone());
        assert_eq!(rx.recv().await.unwrap(), sent);
    }
}
