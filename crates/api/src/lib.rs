//! Presence Relay API Library
//!
//! This crate contains the WebSocket gateway and HTTP surface of the relay.

pub mod config;
pub mod routes;
pub mod security;
pub mod state;
pub mod telemetry;
pub mod websocket;

pub use config::Config;
pub use routes::create_router;
pub use state::AppState;
