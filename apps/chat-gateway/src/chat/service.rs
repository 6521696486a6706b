//! Message service port and its in-process implementation.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chat_common::SnowflakeGenerator;
use chrono::Utc;
use dashmap::DashMap;

use super::message::{Message, MessageStatus, NewMessage};
use super::user::User;

/// Errors reported by a [`MessageService`].
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Persistence capability consumed by the gateway event handler.
///
/// Implementations own authorization: `actor_id` is the user acting through
/// the connection and `chat_id` the chat the connection is viewing.
#[async_trait]
pub trait MessageService: Send + Sync {
    /// Persist a new message and return the stored record.
    async fn create_message(&self, message: NewMessage) -> Result<Message, ServiceError>;

    /// Move the given messages of `chat_id` into `status`.
    async fn update_messages_status(
        &self,
        actor_id: u64,
        chat_id: u64,
        message_ids: &[u64],
        status: MessageStatus,
    ) -> Result<(), ServiceError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation (local development / tests)
// ---------------------------------------------------------------------------

/// `MessageService` backed by in-process maps.
///
/// Chats registered with [`MemoryMessageService::add_chat`] only accept
/// actions from their members. Chats that were never registered are open.
pub struct MemoryMessageService {
    snowflake: Arc<SnowflakeGenerator>,
    messages: DashMap<u64, Message>,
    users: DashMap<u64, User>,
    chats: DashMap<u64, HashSet<u64>>,
}

impl MemoryMessageService {
    pub fn new(snowflake: Arc<SnowflakeGenerator>) -> Self {
        Self {
            snowflake,
            messages: DashMap::new(),
            users: DashMap::new(),
            chats: DashMap::new(),
        }
    }

    /// Make a user's profile available as message `creator`.
    pub fn register_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Register a chat and its participants.
    pub fn add_chat(&self, chat_id: u64, members: impl IntoIterator<Item = u64>) {
        self.chats.insert(chat_id, members.into_iter().collect());
    }

    /// Look up a stored message.
    pub fn message(&self, id: u64) -> Option<Message> {
        self.messages.get(&id).map(|m| m.clone())
    }

    /// Number of stored messages.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    fn ensure_member(&self, chat_id: u64, user_id: u64) -> Result<(), ServiceError> {
        match self.chats.get(&chat_id) {
            Some(members) if !members.contains(&user_id) => Err(ServiceError::Forbidden(format!(
                "user {user_id} is not a participant of chat {chat_id}"
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl MessageService for MemoryMessageService {
    async fn create_message(&self, message: NewMessage) -> Result<Message, ServiceError> {
        if message.text.trim().is_empty() {
            return Err(ServiceError::Validation("message text is empty".to_string()));
        }
        self.ensure_member(message.chat_id, message.created_by)?;

        let now = Utc::now();
        let stored = Message {
            id: self.snowflake.generate(),
            text: message.text,
            status: MessageStatus::Unread,
            chat_id: message.chat_id,
            created_by: message.created_by,
            creator: self
                .users
                .get(&message.created_by)
                .map(|u| u.clone())
                .or(message.creator),
            created_at: now,
            updated_at: now,
        };

        self.messages.insert(stored.id, stored.clone());
        tracing::debug!(message_id = stored.id, chat_id = stored.chat_id, "message stored");

        Ok(stored)
    }

    async fn update_messages_status(
        &self,
        actor_id: u64,
        chat_id: u64,
        message_ids: &[u64],
        status: MessageStatus,
    ) -> Result<(), ServiceError> {
        self.ensure_member(chat_id, actor_id)?;

        // Validate every id before touching any of them.
        for id in message_ids {
            match self.messages.get(id) {
                Some(m) if m.chat_id == chat_id => {}
                _ => {
                    return Err(ServiceError::NotFound(format!(
                        "message {id} in chat {chat_id}"
                    )))
                }
            }
        }

        let now = Utc::now();
        for id in message_ids {
            if let Some(mut m) = self.messages.get_mut(id) {
                m.status = status;
                m.updated_at = now;
            }
        }

        Ok(())
    }
}
