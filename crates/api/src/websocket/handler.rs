//! WebSocket handler for Axum
//!
//! Handles WebSocket connections and routes client events to the presence
//! registry and message store.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::StreamExt, SinkExt};
use relay_shared::NewMessage;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::AppState;

use super::{
    connection::Connection,
    events::{ActivityUpdate, ClientEvent, MessageError, ServerEvent},
    state::WebSocketState,
};

/// WebSocket handler - upgrades HTTP connection to WebSocket
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<AppState>) -> Response {
    tracing::debug!("WebSocket connection upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Create channel for sending events to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let ws_state = app_state.ws_state.clone();
    let conn = ws_state.add_connection(Connection::new(tx)).await;
    let connection_id = conn.id;

    let _ = conn.send(ServerEvent::Connected { connection_id });

    // Spawn task to send messages to client
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break; // Connection closed
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to serialize WebSocket event");
                }
            }
        }
    });

    // Events from one connection are handled strictly in arrival order
    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, error = ?e, "WebSocket read error");
                break;
            }
        };

        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => handle_client_event(event, &conn, &app_state).await,
                Err(e) => {
                    tracing::warn!(
                        error = ?e,
                        message = %text,
                        "Failed to parse client event"
                    );
                    let _ = conn.send(ServerEvent::Error {
                        message: "Invalid event format".to_string(),
                    });
                }
            },
            Message::Close(_) => {
                tracing::info!(connection_id = %connection_id, "WebSocket close frame received");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                // Axum handles ping/pong automatically
            }
            Message::Binary(_) => {}
        }
    }

    tracing::info!(connection_id = %connection_id, "WebSocket connection closing");
    handle_disconnect(&ws_state, &connection_id).await;

    send_task.abort();
}

/// Handle client event
pub async fn handle_client_event(event: ClientEvent, conn: &Arc<Connection>, app_state: &AppState) {
    match event {
        ClientEvent::UserConnected(user_id) => {
            user_connected(&app_state.ws_state, conn, user_id).await;
        }
        ClientEvent::UpdateActivity(update) => {
            update_activity(&app_state.ws_state, update).await;
        }
        ClientEvent::SendMessage(message) => {
            send_message(app_state, conn, message).await;
        }
        ClientEvent::Ping => {
            let _ = conn.send(ServerEvent::Pong);
        }
    }
}

/// Release a closed connection and announce the user it was bound to
pub async fn handle_disconnect(ws_state: &WebSocketState, connection_id: &Uuid) {
    ws_state.remove_connection(connection_id).await;

    let user_id = ws_state.presence.write().await.unregister(connection_id);
    match user_id {
        Some(user_id) => {
            tracing::info!(connection_id = %connection_id, user_id = %user_id, "User went offline");
            ws_state
                .broadcast(ServerEvent::UserDisconnected(user_id))
                .await;
        }
        None => {
            tracing::debug!(connection_id = %connection_id, "Anonymous connection closed");
        }
    }
}

// =============================================================================
// Event Handlers
// =============================================================================

async fn user_connected(ws_state: &WebSocketState, conn: &Arc<Connection>, user_id: String) {
    let (registration, online, activities) = {
        let mut presence = ws_state.presence.write().await;
        let registration = presence.register(&user_id, conn.id);
        (registration, presence.online_user_ids(), presence.activities())
    };

    // The previous connection keeps running but no longer receives direct messages
    if let Some(previous) = registration.superseded {
        tracing::info!(
            user_id = %user_id,
            previous_connection_id = %previous,
            connection_id = %conn.id,
            "User reconnected, previous connection superseded"
        );
    }

    if let Some(released) = registration.released {
        tracing::info!(
            user_id = %released,
            connection_id = %conn.id,
            "Connection re-identified, releasing previous user"
        );
        ws_state
            .broadcast(ServerEvent::UserDisconnected(released))
            .await;
    }

    tracing::info!(
        user_id = %user_id,
        connection_id = %conn.id,
        online_users = online.len(),
        "User connected"
    );

    ws_state
        .broadcast(ServerEvent::UserConnected(user_id))
        .await;
    let _ = conn.send(ServerEvent::UsersOnline(online));
    ws_state.broadcast(ServerEvent::Activities(activities)).await;
}

async fn update_activity(ws_state: &WebSocketState, update: ActivityUpdate) {
    let updated = ws_state
        .presence
        .write()
        .await
        .update_activity(&update.user_id, &update.activity);

    // The announcement goes out even when the user has no presence entry
    if updated {
        tracing::info!(user_id = %update.user_id, activity = %update.activity, "Activity updated");
    } else {
        tracing::debug!(
            user_id = %update.user_id,
            activity = %update.activity,
            "Activity update for offline user, registry unchanged"
        );
    }

    ws_state
        .broadcast(ServerEvent::ActivityUpdated(update))
        .await;
}

async fn send_message(app_state: &AppState, conn: &Arc<Connection>, message: NewMessage) {
    let ws_state = &app_state.ws_state;

    // No registry lock is held while the store is working
    let stored = match app_state.messages.create(message).await {
        Ok(stored) => stored,
        Err(e) => {
            tracing::error!(error = %e, connection_id = %conn.id, "Message error");
            let _ = conn.send(ServerEvent::MessageError(MessageError::from(&e)));
            return;
        }
    };

    // The receiver may have gone offline while the message was being stored
    let receiver_connection = ws_state
        .presence
        .read()
        .await
        .connection_for(&stored.receiver_id);

    match receiver_connection {
        Some(receiver_connection) => {
            ws_state
                .send_to(&receiver_connection, ServerEvent::ReceiveMessage(stored.clone()))
                .await;
        }
        None => {
            tracing::debug!(
                message_id = %stored.id,
                receiver_id = %stored.receiver_id,
                "Receiver offline, message stored only"
            );
        }
    }

    let _ = conn.send(ServerEvent::MessageSent(stored));
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_shared::{ChatMessage, MemoryMessageStore, MessageStore, PersistenceError};

    struct FailingStore(&'static str);

    #[async_trait]
    impl MessageStore for FailingStore {
        async fn create(&self, _message: NewMessage) -> Result<ChatMessage, PersistenceError> {
            Err(PersistenceError::Database(self.0.to_string()))
        }

        async fn health_check(&self) -> Result<(), PersistenceError> {
            Err(PersistenceError::Database(self.0.to_string()))
        }
    }

    struct Client {
        conn: Arc<Connection>,
        rx: mpsc::UnboundedReceiver<ServerEvent>,
    }

    impl Client {
        async fn open(app_state: &AppState) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            let conn = app_state.ws_state.add_connection(Connection::new(tx)).await;
            Self { conn, rx }
        }

        async fn send(&self, app_state: &AppState, event: ClientEvent) {
            handle_client_event(event, &self.conn, app_state).await;
        }

        fn drain(&mut self) -> Vec<ServerEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.rx.try_recv() {
                events.push(event);
            }
            events
        }
    }

    fn memory_state() -> (AppState, MemoryMessageStore) {
        let store = MemoryMessageStore::new();
        (AppState::new(Arc::new(store.clone())), store)
    }

    fn identify(user_id: &str) -> ClientEvent {
        ClientEvent::UserConnected(user_id.to_string())
    }

    #[tokio::test]
    async fn test_user_connected_emits_in_order() {
        let (app_state, _) = memory_state();
        let mut observer = Client::open(&app_state).await;
        let mut alice = Client::open(&app_state).await;

        alice.send(&app_state, identify("alice")).await;

        assert_eq!(
            alice.drain(),
            vec![
                ServerEvent::UserConnected("alice".to_string()),
                ServerEvent::UsersOnline(vec!["alice".to_string()]),
                ServerEvent::Activities(vec![("alice".to_string(), "Idle".to_string())]),
            ]
        );
        // Anonymous connections see the broadcasts but not the private list
        assert_eq!(
            observer.drain(),
            vec![
                ServerEvent::UserConnected("alice".to_string()),
                ServerEvent::Activities(vec![("alice".to_string(), "Idle".to_string())]),
            ]
        );
    }

    #[tokio::test]
    async fn test_online_list_contains_every_user() {
        let (app_state, _) = memory_state();
        let alice = Client::open(&app_state).await;
        let mut bob = Client::open(&app_state).await;

        alice.send(&app_state, identify("alice")).await;
        bob.drain();
        bob.send(&app_state, identify("bob")).await;

        let events = bob.drain();
        assert!(events.contains(&ServerEvent::UsersOnline(vec![
            "alice".to_string(),
            "bob".to_string()
        ])));
    }

    #[tokio::test]
    async fn test_update_activity_broadcasts_once() {
        let (app_state, _) = memory_state();
        let mut alice = Client::open(&app_state).await;
        let mut bob = Client::open(&app_state).await;
        alice.send(&app_state, identify("alice")).await;
        bob.send(&app_state, identify("bob")).await;
        alice.drain();
        bob.drain();

        let update = ActivityUpdate {
            user_id: "alice".to_string(),
            activity: "Typing".to_string(),
        };
        alice
            .send(&app_state, ClientEvent::UpdateActivity(update.clone()))
            .await;

        let expected = vec![ServerEvent::ActivityUpdated(update)];
        assert_eq!(alice.drain(), expected);
        assert_eq!(bob.drain(), expected);

        let presence = app_state.ws_state.presence.read().await;
        assert_eq!(presence.activity_of("alice"), Some("Typing"));
        assert_eq!(presence.activity_of("bob"), Some("Idle"));
    }

    #[tokio::test]
    async fn test_update_activity_for_offline_user_still_broadcasts() {
        let (app_state, _) = memory_state();
        let mut alice = Client::open(&app_state).await;
        let mut observer = Client::open(&app_state).await;

        let update = ActivityUpdate {
            user_id: "ghost".to_string(),
            activity: "Typing".to_string(),
        };
        alice
            .send(&app_state, ClientEvent::UpdateActivity(update.clone()))
            .await;

        let expected = vec![ServerEvent::ActivityUpdated(update)];
        assert_eq!(alice.drain(), expected);
        assert_eq!(observer.drain(), expected);

        let presence = app_state.ws_state.presence.read().await;
        assert!(presence.is_empty());
        assert_eq!(presence.activity_of("ghost"), None);
    }

    #[tokio::test]
    async fn test_disconnect_announces_user_once() {
        let (app_state, _) = memory_state();
        let alice = Client::open(&app_state).await;
        let mut bob = Client::open(&app_state).await;
        alice.send(&app_state, identify("alice")).await;
        bob.drain();

        handle_disconnect(&app_state.ws_state, &alice.conn.id).await;

        assert_eq!(
            bob.drain(),
            vec![ServerEvent::UserDisconnected("alice".to_string())]
        );
        assert!(app_state
            .ws_state
            .presence
            .read()
            .await
            .online_user_ids()
            .is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_disconnect_is_silent() {
        let (app_state, _) = memory_state();
        let anonymous = Client::open(&app_state).await;
        let mut bob = Client::open(&app_state).await;

        handle_disconnect(&app_state.ws_state, &anonymous.conn.id).await;

        assert!(bob.drain().is_empty());
        assert_eq!(app_state.ws_state.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_superseded_connection_disconnect_keeps_new_binding() {
        let (app_state, _) = memory_state();
        let mut first = Client::open(&app_state).await;
        let second = Client::open(&app_state).await;
        let mut observer = Client::open(&app_state).await;

        first.send(&app_state, identify("alice")).await;
        second.send(&app_state, identify("alice")).await;
        first.drain();
        observer.drain();

        handle_disconnect(&app_state.ws_state, &first.conn.id).await;

        assert!(observer.drain().is_empty());
        let presence = app_state.ws_state.presence.read().await;
        assert_eq!(presence.connection_for("alice"), Some(second.conn.id));
        assert_eq!(presence.len(), 1);
    }

    #[tokio::test]
    async fn test_reidentify_announces_released_user() {
        let (app_state, _) = memory_state();
        let conn = Client::open(&app_state).await;
        let mut observer = Client::open(&app_state).await;

        conn.send(&app_state, identify("alice")).await;
        observer.drain();
        conn.send(&app_state, identify("bob")).await;

        let events = observer.drain();
        assert_eq!(
            events.first(),
            Some(&ServerEvent::UserDisconnected("alice".to_string()))
        );
        assert!(events.contains(&ServerEvent::UserConnected("bob".to_string())));
    }

    #[tokio::test]
    async fn test_send_message_delivers_to_receiver_and_confirms() {
        let (app_state, store) = memory_state();
        let mut alice = Client::open(&app_state).await;
        let mut bob = Client::open(&app_state).await;
        alice.send(&app_state, identify("alice")).await;
        bob.send(&app_state, identify("bob")).await;
        alice.drain();
        bob.drain();

        alice
            .send(
                &app_state,
                ClientEvent::SendMessage(NewMessage::new("alice", "bob", "hi")),
            )
            .await;

        let stored = store.messages().await;
        assert_eq!(stored.len(), 1);
        let message = stored[0].clone();
        assert_eq!(message.sender_id, "alice");
        assert_eq!(message.receiver_id, "bob");
        assert_eq!(message.content, "hi");

        assert_eq!(bob.drain(), vec![ServerEvent::ReceiveMessage(message.clone())]);
        assert_eq!(alice.drain(), vec![ServerEvent::MessageSent(message)]);
    }

    #[tokio::test]
    async fn test_send_message_store_failure_reports_to_sender_only() {
        let app_state = AppState::new(Arc::new(FailingStore("DB down")));
        let mut alice = Client::open(&app_state).await;
        let mut bob = Client::open(&app_state).await;
        alice.send(&app_state, identify("alice")).await;
        bob.send(&app_state, identify("bob")).await;
        alice.drain();
        bob.drain();

        alice
            .send(
                &app_state,
                ClientEvent::SendMessage(NewMessage::new("alice", "bob", "hi")),
            )
            .await;

        assert_eq!(
            alice.drain(),
            vec![ServerEvent::MessageError(MessageError {
                code: "database_error".to_string(),
                message: "DB down".to_string(),
            })]
        );
        assert!(bob.drain().is_empty());
    }

    #[tokio::test]
    async fn test_send_message_to_offline_user_is_stored() {
        let (app_state, store) = memory_state();
        let mut alice = Client::open(&app_state).await;
        let mut observer = Client::open(&app_state).await;
        alice.send(&app_state, identify("alice")).await;
        alice.drain();
        observer.drain();

        alice
            .send(
                &app_state,
                ClientEvent::SendMessage(NewMessage::new("alice", "carol", "hi")),
            )
            .await;

        assert_eq!(store.len().await, 1);
        let events = alice.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ServerEvent::MessageSent(_)));
        assert!(observer.drain().is_empty());
    }

    #[tokio::test]
    async fn test_send_message_validation_failure() {
        let (app_state, store) = memory_state();
        let mut alice = Client::open(&app_state).await;

        alice
            .send(
                &app_state,
                ClientEvent::SendMessage(NewMessage::new("alice", "bob", "")),
            )
            .await;

        assert!(store.is_empty().await);
        assert_eq!(
            alice.drain(),
            vec![ServerEvent::MessageError(MessageError {
                code: "validation_error".to_string(),
                message: "content is required".to_string(),
            })]
        );
    }

    #[tokio::test]
    async fn test_ping_answers_privately() {
        let (app_state, _) = memory_state();
        let mut alice = Client::open(&app_state).await;
        let mut bob = Client::open(&app_state).await;

        alice.send(&app_state, ClientEvent::Ping).await;

        assert_eq!(alice.drain(), vec![ServerEvent::Pong]);
        assert!(bob.drain().is_empty());
    }
}
