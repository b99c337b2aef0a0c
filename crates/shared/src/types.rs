//! Common types used across the relay

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::PersistenceError;

/// A stored chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A message that has not been persisted yet
///
/// Missing fields deserialize as empty strings and are rejected by
/// [`NewMessage::validate`], so the store reports them like any other
/// validation failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
}

impl NewMessage {
    pub fn new(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            content: content.into(),
        }
    }

    /// Check that every field is present
    pub fn validate(&self) -> Result<(), PersistenceError> {
        let required = [
            ("senderId", &self.sender_id),
            ("receiverId", &self.receiver_id),
            ("content", &self.content),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(PersistenceError::Validation(format!("{field} is required")));
            }
        }

        Ok(())
    }

    /// Stamp the message with a fresh id and the current time
    pub fn into_stored(self) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            content: self.content,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}
