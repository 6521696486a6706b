use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_common::SnowflakeGenerator;
use chat_gateway::auth::session::{KvSessionResolver, SessionResolver};
use chat_gateway::chat::service::MemoryMessageService;
use chat_gateway::config::Config;
use chat_gateway::db::kv::{KeyValueStore, MemoryStore};
use chat_gateway::gateway::connector::{Connector, ConnectorConfig};
use chat_gateway::gateway::handler::EventHandler;
use chat_gateway::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing, env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port = config.port;

    // In-memory KV store for sessions. Replace with a shared store for multi-process setups.
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let resolver = Arc::new(KvSessionResolver::new(kv));
    let sessions: Arc<dyn SessionResolver> = resolver.clone();
    let dev_sessions = config.dev_sessions.then(|| resolver.clone());
    if dev_sessions.is_some() {
        tracing::warn!("DEV_SESSIONS enabled, POST /dev/sessions issues tokens without credentials");
    }

    let snowflake = Arc::new(SnowflakeGenerator::new(config.worker_id));
    let messages = Arc::new(MemoryMessageService::new(snowflake));

    let connector = Arc::new(Connector::new(
        EventHandler::new(messages),
        ConnectorConfig::from(&config),
    ));

    let shutdown = CancellationToken::new();
    let supervisor = tokio::spawn({
        let connector = Arc::clone(&connector);
        let shutdown = shutdown.clone();
        async move { connector.start(shutdown).await }
    });

    tracing::info!(
        worker_id = config.worker_id,
        sweep_interval_secs = config.sweep_interval.as_secs(),
        "chat-gateway configured"
    );

    let state = AppState {
        connector,
        sessions,
        dev_sessions,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(chat_gateway::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "chat-gateway listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("server error");

    match supervisor.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!(%err, "connector failed"),
        Err(err) => tracing::error!(%err, "connector task aborted"),
    }
    tracing::info!("shutdown complete");
}

/// Resolves on SIGINT or SIGTERM, after cancelling `shutdown` so the
/// connector closes every live connection.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, closing connections");
    shutdown.cancel();
}
