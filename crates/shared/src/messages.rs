//! Chat message persistence
//!
//! The relay only ever creates messages; reading history is left to other
//! services sharing the same table.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::PersistenceError;
use crate::types::{ChatMessage, NewMessage};

/// Storage backend for chat messages
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message, assigning its id and creation time
    async fn create(&self, message: NewMessage) -> Result<ChatMessage, PersistenceError>;

    /// Check that the backend is reachable
    async fn health_check(&self) -> Result<(), PersistenceError>;
}

/// PostgreSQL-backed message store
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn create(&self, message: NewMessage) -> Result<ChatMessage, PersistenceError> {
        message.validate()?;

        let stored = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO messages (id, sender_id, receiver_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, sender_id, receiver_id, content, created_at
            "#,
        )
        .bind(uuid::Uuid::new_v4())
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(&message.content)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(
            message_id = %stored.id,
            sender_id = %stored.sender_id,
            receiver_id = %stored.receiver_id,
            "Message persisted"
        );

        Ok(stored)
    }

    async fn health_check(&self) -> Result<(), PersistenceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// In-process message store, used when no database is configured
///
/// Meant for development and tests: messages are never evicted and are lost
/// on restart.
#[derive(Clone, Default)]
pub struct MemoryMessageStore {
    messages: Arc<RwLock<Vec<ChatMessage>>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored message, oldest first
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.messages.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn create(&self, message: NewMessage) -> Result<ChatMessage, PersistenceError> {
        message.validate()?;

        let stored = message.into_stored();
        self.messages.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn health_check(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}
