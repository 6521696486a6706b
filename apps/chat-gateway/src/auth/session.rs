//! Token → session resolution.

use std::sync::Arc;

use async_trait::async_trait;

use crate::chat::user::{Session, User};
use crate::db::kv::KeyValueStore;
use crate::error::ApiError;

use super::tokens;

/// Resolves the session bound to a client-presented token.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Returns `Ok(None)` when the token is unknown or expired.
    async fn resolve(&self, token: &str) -> Result<Option<Session>, ApiError>;
}

/// Session resolver backed by a [`KeyValueStore`].
pub struct KvSessionResolver {
    kv: Arc<dyn KeyValueStore>,
}

impl KvSessionResolver {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Create a session for `user` and return its token.
    pub async fn issue(&self, user: User) -> Result<(String, Session), ApiError> {
        let token = tokens::generate_session_token();
        let session = Session {
            id: chat_common::id::prefixed_ulid(chat_common::id::prefix::SESSION),
            user,
        };
        tokens::store_session(self.kv.as_ref(), &token, &session).await?;
        Ok((token, session))
    }

    pub async fn revoke(&self, token: &str) -> Result<(), ApiError> {
        tokens::revoke_session(self.kv.as_ref(), token).await
    }
}

#[async_trait]
impl SessionResolver for KvSessionResolver {
    async fn resolve(&self, token: &str) -> Result<Option<Session>, ApiError> {
        tokens::lookup_session(self.kv.as_ref(), token).await
    }
}
