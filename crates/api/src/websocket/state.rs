//! Global WebSocket state management
//!
//! Maintains every open connection and the presence registry.

use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::connection::Connection;
use super::events::ServerEvent;
use super::presence::PresenceRegistry;

/// Global WebSocket state shared across all connections
#[derive(Clone)]
pub struct WebSocketState {
    /// All open connections, identified or not, indexed by connection id
    pub connections: Arc<RwLock<HashMap<Uuid, Arc<Connection>>>>,

    /// Online users and their activity labels
    pub presence: Arc<RwLock<PresenceRegistry>>,
}

impl WebSocketState {
    /// Create new WebSocket state
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            presence: Arc::new(RwLock::new(PresenceRegistry::new())),
        }
    }

    /// Add a connection
    pub async fn add_connection(&self, conn: Connection) -> Arc<Connection> {
        let conn = Arc::new(conn);
        let mut connections = self.connections.write().await;
        connections.insert(conn.id, Arc::clone(&conn));

        tracing::info!(
            connection_id = %conn.id,
            total_connections = connections.len(),
            "WebSocket connection added"
        );

        conn
    }

    /// Remove a connection
    pub async fn remove_connection(&self, connection_id: &Uuid) -> Option<Arc<Connection>> {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(connection_id);
        if let Some(conn) = &removed {
            tracing::info!(
                connection_id = %connection_id,
                connected_secs = (OffsetDateTime::now_utc() - conn.connected_at).whole_seconds(),
                remaining_connections = connections.len(),
                "WebSocket connection removed"
            );
        }
        removed
    }

    /// Get a connection by id
    pub async fn get_connection(&self, connection_id: &Uuid) -> Option<Arc<Connection>> {
        let connections = self.connections.read().await;
        connections.get(connection_id).cloned()
    }

    /// Send an event to a single connection
    ///
    /// Returns false when the connection is unknown or already closed
    pub async fn send_to(&self, connection_id: &Uuid, event: ServerEvent) -> bool {
        let Some(conn) = self.get_connection(connection_id).await else {
            tracing::debug!(
                connection_id = %connection_id,
                event_type = event.name(),
                "No open connection for targeted event"
            );
            return false;
        };

        match conn.send(event) {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    "Failed to send event to connection (likely closed)"
                );
                false
            }
        }
    }

    /// Broadcast an event to every open connection
    ///
    /// Connections whose writer has gone away are skipped; they are removed
    /// when their read loop ends.
    /// Returns the number of connections the event was queued for.
    pub async fn broadcast(&self, event: ServerEvent) -> usize {
        let connections = self.connections.read().await;
        let mut success_count = 0;
        let mut failed_count = 0;

        for conn in connections.values() {
            if conn.is_closed() {
                failed_count += 1;
                continue;
            }

            match conn.send(event.clone()) {
                Ok(()) => success_count += 1,
                Err(_) => {
                    failed_count += 1;
                    tracing::warn!(
                        connection_id = %conn.id,
                        "Failed to send event to connection (likely closed)"
                    );
                }
            }
        }

        tracing::debug!(
            event_type = event.name(),
            recipients = success_count,
            failed = failed_count,
            "Broadcast event to all connections"
        );

        success_count
    }

    /// Get total number of open connections
    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    /// Get statistics about the WebSocket state
    pub async fn get_stats(&self) -> WebSocketStats {
        let active_connections = self.connection_count().await;
        let online_users = self.presence.read().await.len();

        WebSocketStats {
            active_connections,
            online_users,
        }
    }
}

impl Default for WebSocketState {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about WebSocket connections
#[derive(Debug, Clone)]
pub struct WebSocketStats {
    /// Number of open connections
    pub active_connections: usize,
    /// Number of identified users
    pub online_users: usize,
}
