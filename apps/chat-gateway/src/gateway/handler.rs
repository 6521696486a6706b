//! Inbound event dispatch for one connection.

use std::sync::Arc;

use crate::chat::message::{MessageStatus, NewMessage};
use crate::chat::service::MessageService;

use super::connection::Connection;
use super::error::EventError;
use super::events::{Event, EventType, MessageDraft, MessageDto, MessagesStatusDto};
use super::fanout;
use super::registry::ConnectionRegistry;

/// Stateless protocol dispatcher. Holds only the message service.
pub struct EventHandler {
    messages: Arc<dyn MessageService>,
}

impl EventHandler {
    pub fn new(messages: Arc<dyn MessageService>) -> Self {
        Self { messages }
    }

    /// Apply one event from `conn`. Errors abort this event only.
    pub async fn handle(
        &self,
        registry: &ConnectionRegistry,
        conn: &Arc<Connection>,
        event: Event,
    ) -> Result<(), EventError> {
        let Some(event_type) = EventType::from_code(event.event_type) else {
            tracing::debug!(conn_id = %conn.id(), event_type = event.event_type, "ignoring unknown event type");
            return Ok(());
        };

        match event_type {
            // A null id list means "none".
            EventType::SubscribeChats => {
                let ids: Option<Vec<u64>> = event.payload()?;
                conn.set_subscribed_chats(ids.unwrap_or_default());
            }
            EventType::UnsubscribeChats => {
                let ids: Option<Vec<u64>> = event.payload()?;
                conn.unsubscribe_chats(&ids.unwrap_or_default());
            }
            EventType::SetCurrentChat => {
                let chat_id: u64 = event.payload()?;
                conn.set_current_chat(chat_id);
            }
            EventType::UnsetCurrentChat => conn.unset_current_chat(),
            EventType::CreateMessage => self.create_message(registry, conn, &event).await?,
            EventType::UpdateMessagesStatus => {
                self.update_messages_status(registry, conn, &event).await?
            }
            EventType::EditMessage | EventType::DeleteMessage => {
                tracing::debug!(conn_id = %conn.id(), ?event_type, "event type reserved, ignored");
            }
        }

        Ok(())
    }

    async fn create_message(
        &self,
        registry: &ConnectionRegistry,
        conn: &Arc<Connection>,
        event: &Event,
    ) -> Result<(), EventError> {
        let draft: MessageDraft = event.payload()?;

        let Some(chat_id) = conn.current_chat() else {
            tracing::debug!(conn_id = %conn.id(), "create-message without current chat, ignored");
            return Ok(());
        };

        let message = self
            .messages
            .create_message(NewMessage {
                chat_id,
                created_by: conn.user_id(),
                text: draft.text,
                creator: Some(conn.session().user.clone()),
            })
            .await?;

        let mut dto = MessageDto::from(&message);
        fanout::broadcast(registry, chat_id, Some(conn.id()), EventType::CreateMessage, &dto).await?;

        dto.uuid = draft.uuid;
        conn.send_event(EventType::CreateMessage, &dto).await?;

        Ok(())
    }

    async fn update_messages_status(
        &self,
        registry: &ConnectionRegistry,
        conn: &Arc<Connection>,
        event: &Event,
    ) -> Result<(), EventError> {
        let dto: MessagesStatusDto = event.payload()?;

        let status = MessageStatus::try_from(dto.status)
            .ok()
            .filter(|s| s.is_client_settable())
            .ok_or(EventError::InvalidStatus(dto.status))?;

        let Some(chat_id) = conn.current_chat() else {
            return Ok(());
        };
        if dto.message_ids.is_empty() {
            return Ok(());
        }

        self.messages
            .update_messages_status(conn.user_id(), chat_id, &dto.message_ids, status)
            .await?;

        fanout::broadcast(registry, chat_id, None, EventType::UpdateMessagesStatus, &dto).await?;

        Ok(())
    }
}
