//! Presence Relay Shared Types and Utilities
//!
//! This crate contains the chat message model, persistence errors and the
//! message store used by the relay.

pub mod db;
pub mod error;
pub mod messages;
pub mod types;

pub use db::*;
pub use error::*;
pub use messages::{MemoryMessageStore, MessageStore, PgMessageStore};
pub use types::*;
