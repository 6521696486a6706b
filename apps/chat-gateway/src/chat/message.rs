use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::User;

/// Lifecycle status of a chat message. Encoded on the wire as its `u8` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum MessageStatus {
    Draft = 1,
    Unread = 2,
    Read = 3,
}

impl MessageStatus {
    /// Statuses a client may move messages into through `update-messages-status`.
    pub fn is_client_settable(self) -> bool {
        matches!(self, MessageStatus::Unread | MessageStatus::Read)
    }
}

impl From<MessageStatus> for u8 {
    fn from(status: MessageStatus) -> Self {
        status as u8
    }
}

impl TryFrom<u8> for MessageStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageStatus::Draft),
            2 => Ok(MessageStatus::Unread),
            3 => Ok(MessageStatus::Read),
            other => Err(format!("unknown message status {other}")),
        }
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: u64,
    pub text: String,
    pub status: MessageStatus,
    pub chat_id: u64,
    pub created_by: u64,
    /// Author profile, filled in by the message service when known.
    pub creator: Option<User>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A message about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub chat_id: u64,
    pub created_by: u64,
    pub text: String,
    /// Author profile as known to the caller's session.
    pub creator: Option<User>,
}
