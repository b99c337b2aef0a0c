//! Application configuration

use axum::http::HeaderValue;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub client_origin: HeaderValue, // the only origin allowed by CORS

    // Database
    pub database_url: Option<String>, // in-memory store when unset
    pub database_max_connections: u32,

    // Logging
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:5000".to_string()),
            client_origin: {
                let origin = env::var("CLIENT_ORIGIN")
                    .unwrap_or_else(|_| "http://localhost:5173".to_string());
                parse_origin(&origin)?
            },

            // Database
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),

            // Logging
            log_json: env::var("LOG_FORMAT")
                .map(|format| format.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}

fn parse_origin(origin: &str) -> Result<HeaderValue, ConfigError> {
    let origin = origin.trim_end_matches('/');
    if !(origin.starts_with("http://") || origin.starts_with("https://")) {
        return Err(ConfigError::InvalidOrigin(origin.to_string()));
    }
    HeaderValue::from_str(origin).map_err(|_| ConfigError::InvalidOrigin(origin.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid CLIENT_ORIGIN (expected http:// or https:// URL): {0}")]
    InvalidOrigin(String),
}
