//! WebSocket support for real-time presence and chat
//!
//! Provides the WebSocket gateway of the relay:
//! - User presence tracking (who is online, on which connection)
//! - Activity labels (Idle, Typing, ...)
//! - Real-time delivery of persisted chat messages
//!
//! # Architecture
//!
//! - **Connection**: Represents one open WebSocket session
//! - **Presence**: Registry of online users and their activity labels
//! - **State**: Global WebSocket state shared across all connections
//! - **Handler**: Axum WebSocket route handler and event dispatch
//! - **Events**: Type-safe event definitions for client/server communication

pub mod connection;
pub mod events;
pub mod handler;
pub mod presence;
pub mod state;

pub use handler::ws_handler;
pub use presence::PresenceRegistry;
pub use state::WebSocketState;
