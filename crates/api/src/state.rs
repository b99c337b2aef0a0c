//! Shared application state

use relay_shared::MessageStore;
use std::sync::Arc;

use crate::websocket::WebSocketState;

/// State handed to every Axum handler
#[derive(Clone)]
pub struct AppState {
    pub ws_state: WebSocketState,
    pub messages: Arc<dyn MessageStore>,
}

impl AppState {
    pub fn new(messages: Arc<dyn MessageStore>) -> Self {
        Self {
            ws_state: WebSocketState::new(),
            messages,
        }
    }
}
