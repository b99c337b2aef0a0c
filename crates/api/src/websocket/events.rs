//! WebSocket event types and serialization
//!
//! Every frame is a JSON object of the form `{"type": "...", "data": ...}`.
//! Payload-less events omit `data`.

use relay_shared::{ChatMessage, NewMessage, PersistenceError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Events sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Identify this connection as a user
    UserConnected(String),

    /// Change a user's activity label
    UpdateActivity(ActivityUpdate),

    /// Persist a chat message and relay it to the receiver
    SendMessage(NewMessage),

    /// Heartbeat ping to keep connection alive
    Ping,
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from server to client
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Connection acknowledged
    Connected {
        #[serde(rename = "connectionId")]
        connection_id: Uuid,
    },

    /// A user identified themselves
    UserConnected(String),

    /// Every currently online user id (sent privately on identify)
    UsersOnline(Vec<String>),

    /// Every `[userId, activity]` pair
    Activities(Vec<(String, String)>),

    ActivityUpdated(ActivityUpdate),

    /// Message addressed to this connection's user
    ReceiveMessage(ChatMessage),

    /// Confirmation that the sender's message was stored
    MessageSent(ChatMessage),

    /// The sender's message could not be stored
    MessageError(MessageError),

    UserDisconnected(String),

    /// Heartbeat response
    Pong,

    /// Error message
    Error { message: String },
}

impl ServerEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::UserConnected(_) => "user_connected",
            ServerEvent::UsersOnline(_) => "users_online",
            ServerEvent::Activities(_) => "activities",
            ServerEvent::ActivityUpdated(_) => "activity_updated",
            ServerEvent::ReceiveMessage(_) => "receive_message",
            ServerEvent::MessageSent(_) => "message_sent",
            ServerEvent::MessageError(_) => "message_error",
            ServerEvent::UserDisconnected(_) => "user_disconnected",
            ServerEvent::Pong => "pong",
            ServerEvent::Error { .. } => "error",
        }
    }
}

// =============================================================================
// Event Data Structures
// =============================================================================

/// Activity label change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityUpdate {
    pub user_id: String,
    pub activity: String,
}

/// Persistence failure as seen by the sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageError {
    pub code: String,
    pub message: String,
}

impl From<&PersistenceError> for MessageError {
    fn from(err: &PersistenceError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}
