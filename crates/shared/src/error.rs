//! Error types for the relay

use thiserror::Error;

/// Failure reported by a [`crate::MessageStore`].
///
/// The display text is the bare description; it is forwarded verbatim to the
/// sending client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Database(String),
}

impl PersistenceError {
    /// Stable machine-readable code used on the wire
    pub fn code(&self) -> &'static str {
        match self {
            PersistenceError::Validation(_) => "validation_error",
            PersistenceError::Database(_) => "database_error",
        }
    }
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        match err {
            sqlx::Error::Database(db_err) => PersistenceError::Database(db_err.message().to_string()),
            _ => PersistenceError::Database(err.to_string()),
        }
    }
}
