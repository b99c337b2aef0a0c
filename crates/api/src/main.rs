//! Presence relay server binary

use anyhow::Context;
use relay_api::{create_router, telemetry, AppState, Config};
use relay_shared::{MemoryMessageStore, MessageStore, PgMessageStore};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;
    telemetry::init_tracing(config.log_json);

    tracing::info!("Presence relay v{} starting", env!("CARGO_PKG_VERSION"));

    let messages = build_message_store(&config).await?;
    let state = AppState::new(messages);
    let app = create_router(state, config.client_origin.clone());

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;

    tracing::info!(
        address = %listener.local_addr()?,
        client_origin = ?config.client_origin,
        "Listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Presence relay stopped");
    Ok(())
}

async fn build_message_store(config: &Config) -> anyhow::Result<Arc<dyn MessageStore>> {
    let Some(database_url) = &config.database_url else {
        tracing::warn!(
            "DATABASE_URL not set, using the in-memory message store: messages grow \
             unbounded and are lost on restart, do not use in production"
        );
        return Ok(Arc::new(MemoryMessageStore::new()));
    };

    let pool = relay_shared::create_pool(database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    relay_shared::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    tracing::info!(
        max_connections = config.database_max_connections,
        "Connected to database"
    );

    Ok(Arc::new(PgMessageStore::new(pool)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
