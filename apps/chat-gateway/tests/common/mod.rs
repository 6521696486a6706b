#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use serde_json::Value;

use chat_common::SnowflakeGenerator;
use chat_gateway::auth::session::KvSessionResolver;
use chat_gateway::chat::service::{MemoryMessageService, MessageService};
use chat_gateway::chat::user::{Session, User, USER_ROLE};
use chat_gateway::config::Config;
use chat_gateway::db::kv::MemoryStore;
use chat_gateway::gateway::connection::Connection;
use chat_gateway::gateway::connector::{Connector, ConnectorConfig};
use chat_gateway::gateway::handler::EventHandler;
use chat_gateway::gateway::transport::memory::{self, MemoryPeer};
use chat_gateway::AppState;

/// How long tests wait for a frame that should arrive.
pub const WAIT: Duration = Duration::from_secs(2);

/// How long tests wait before concluding a frame will not arrive.
pub const QUIET: Duration = Duration::from_millis(150);

pub fn user(id: u64) -> User {
    let now = chrono::Utc::now();
    User {
        id,
        email: format!("user{id}@example.com"),
        username: format!("user{id}"),
        role: USER_ROLE,
        first_name: format!("First{id}"),
        last_name: format!("Last{id}"),
        about_me: String::new(),
        created_at: now,
        updated_at: now,
    }
}

pub fn session(user_id: u64) -> Session {
    Session {
        id: chat_common::id::prefixed_ulid(chat_common::id::prefix::SESSION),
        user: user(user_id),
    }
}

pub fn memory_service() -> Arc<MemoryMessageService> {
    Arc::new(MemoryMessageService::new(Arc::new(SnowflakeGenerator::new(1))))
}

pub fn connector_with(service: Arc<dyn MessageService>, config: ConnectorConfig) -> Arc<Connector> {
    Arc::new(Connector::new(EventHandler::new(service), config))
}

/// Admit a connection for `user_id` over an in-memory transport.
pub fn connect(connector: &Connector, user_id: u64) -> (Arc<Connection>, MemoryPeer) {
    let (reader, writer, peer) = memory::pair();
    let conn = connector
        .add_connection(session(user_id), Box::new(reader), Box::new(writer))
        .expect("admit connection");
    (conn, peer)
}

/// Next frame from the server decoded as JSON, or `None` after `timeout`.
pub async fn next_event(peer: &mut MemoryPeer, timeout: Duration) -> Option<Value> {
    peer.recv_timeout(timeout)
        .await
        .map(|frame| serde_json::from_str(&frame).expect("server frame is JSON"))
}

/// Poll `check` until it holds or roughly two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Application state with an in-memory session store. The resolver is
/// returned separately so tests can issue tokens.
pub fn test_state() -> (AppState, Arc<KvSessionResolver>) {
    state_with(&Config::default())
}

/// Application state built the way the binary builds it from `config`.
pub fn state_with(config: &Config) -> (AppState, Arc<KvSessionResolver>) {
    let sessions = Arc::new(KvSessionResolver::new(Arc::new(MemoryStore::new())));
    let connector = connector_with(memory_service(), ConnectorConfig::from(config));

    let state = AppState {
        connector,
        sessions: sessions.clone(),
        dev_sessions: config.dev_sessions.then(|| sessions.clone()),
    };
    (state, sessions)
}

pub fn test_app() -> (Router, AppState, Arc<KvSessionResolver>) {
    app_with(&Config::default())
}

pub fn app_with(config: &Config) -> (Router, AppState, Arc<KvSessionResolver>) {
    let (state, sessions) = state_with(config);
    let app = chat_gateway::routes::router().with_state(state.clone());
    (app, state, sessions)
}
