//! Cross-origin access control
//!
//! Browsers may only reach the relay from the single configured client
//! origin, with credentials.

mod cors;

pub use cors::cors_layer;
