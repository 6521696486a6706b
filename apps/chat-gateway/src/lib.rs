pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use auth::session::{KvSessionResolver, SessionResolver};
use gateway::connector::Connector;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub connector: Arc<Connector>,
    pub sessions: Arc<dyn SessionResolver>,
    /// Set when `POST /dev/sessions` may issue tokens.
    pub dev_sessions: Option<Arc<KvSessionResolver>>,
}
