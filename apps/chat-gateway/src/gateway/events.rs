//! Event envelope, event type catalog, and wire-format payloads.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::chat::message::Message;
use crate::chat::user::UserDto;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Event type codes shared by client and server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum EventType {
    SubscribeChats = 1,
    UnsubscribeChats = 2,
    SetCurrentChat = 3,
    UnsetCurrentChat = 4,
    CreateMessage = 5,
    EditMessage = 6,
    DeleteMessage = 7,
    UpdateMessagesStatus = 8,
}

impl EventType {
    pub fn code(self) -> u64 {
        self as u64
    }

    pub fn from_code(code: u64) -> Option<Self> {
        Some(match code {
            1 => EventType::SubscribeChats,
            2 => EventType::UnsubscribeChats,
            3 => EventType::SetCurrentChat,
            4 => EventType::UnsetCurrentChat,
            5 => EventType::CreateMessage,
            6 => EventType::EditMessage,
            7 => EventType::DeleteMessage,
            8 => EventType::UpdateMessagesStatus,
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One JSON frame in either direction: `{"type": <uint>, "data": <json>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: u64,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Value,
}

impl Event {
    /// Decode an inbound frame.
    pub fn decode(frame: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(frame)
    }

    /// Decode the `data` field into a typed payload.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

#[derive(Serialize)]
struct OutboundEvent<'a, T> {
    #[serde(rename = "type")]
    event_type: u64,
    data: &'a T,
}

/// Encode an outbound frame.
pub fn encode<T: Serialize>(event_type: EventType, data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&OutboundEvent {
        event_type: event_type.code(),
        data,
    })
}

// ---------------------------------------------------------------------------
// create-message payloads
// ---------------------------------------------------------------------------

/// What a client sends for create-message. Other message fields are ignored.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct MessageDraft {
    /// Client correlation id, echoed back to the sender only.
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// A message as broadcast to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub id: u64,
    pub text: String,
    pub status: u8,
    pub chat_id: u64,
    pub created_by: u64,
    pub creator: Option<UserDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        Self {
            uuid: None,
            id: message.id,
            text: message.text.clone(),
            status: message.status.into(),
            chat_id: message.chat_id,
            created_by: message.created_by,
            creator: message.creator.as_ref().map(UserDto::from),
            created_at: message.created_at,
            updated_at: message.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// update-messages-status payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessagesStatusDto {
    pub status: u8,
    #[serde(default)]
    pub message_ids: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::MessageStatus;
    use serde_json::json;

    fn message() -> Message {
        let now = Utc::now();
        Message {
            id: 99,
            text: "hi".to_string(),
            status: MessageStatus::Unread,
            chat_id: 10,
            created_by: 1,
            creator: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn event_codes_match_catalog() {
        for code in 1..=8 {
            let ty = EventType::from_code(code).unwrap();
            assert_eq!(ty.code(), code);
        }
        assert_eq!(EventType::from_code(5), Some(EventType::CreateMessage));
        assert!(EventType::from_code(0).is_none());
        assert!(EventType::from_code(9).is_none());
    }

    #[test]
    fn decode_envelope() {
        let event = Event::decode(br#"{"type":1,"data":[10,11]}"#).unwrap();
        assert_eq!(event.event_type, 1);
        let ids: Vec<u64> = event.payload().unwrap();
        assert_eq!(ids, vec![10, 11]);
    }

    #[test]
    fn decode_envelope_without_data() {
        let event = Event::decode(br#"{"type":4}"#).unwrap();
        assert_eq!(event.event_type, 4);
        assert!(event.data.is_null());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Event::decode(b"not json").is_err());
        assert!(Event::decode(br#"{"data":1}"#).is_err());
    }

    #[test]
    fn payload_type_mismatch_is_an_error() {
        let event = Event::decode(br#"{"type":3,"data":"ten"}"#).unwrap();
        assert!(event.payload::<u64>().is_err());
    }

    #[test]
    fn encode_envelope_shape() {
        let frame = encode(EventType::SetCurrentChat, &10u64).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value, json!({ "type": 3, "data": 10 }));
    }

    #[test]
    fn broadcast_dto_omits_correlation_id() {
        let dto = MessageDto::from(&message());
        let value = serde_json::to_value(&dto).unwrap();
        assert!(value.get("uuid").is_none());
        assert_eq!(value["chatId"], 10);
        assert_eq!(value["createdBy"], 1);
        assert_eq!(value["status"], 2);

        let echo = MessageDto {
            uuid: Some("draft-1".to_string()),
            ..dto
        };
        let value = serde_json::to_value(&echo).unwrap();
        assert_eq!(value["uuid"], "draft-1");
    }

    #[test]
    fn client_decodes_broadcast_dto() {
        let dto = MessageDto::from(&message());
        let frame = encode(EventType::CreateMessage, &dto).unwrap();

        let event = Event::decode(frame.as_bytes()).unwrap();
        assert_eq!(event.event_type, EventType::CreateMessage.code());
        let decoded: MessageDto = event.payload().unwrap();
        assert_eq!(decoded.id, 99);
        assert_eq!(decoded.text, "hi");
        assert_eq!(decoded.status, 2);
        assert_eq!(decoded.chat_id, 10);
        assert_eq!(decoded.created_by, 1);
        assert!(decoded.uuid.is_none());
    }

    #[test]
    fn draft_ignores_server_fields() {
        let draft: MessageDraft =
            serde_json::from_value(json!({ "uuid": "u-1", "text": "yo", "id": 5, "chatId": 3 }))
                .unwrap();
        assert_eq!(draft.uuid.as_deref(), Some("u-1"));
        assert_eq!(draft.text, "yo");
    }

    #[test]
    fn status_dto_uses_camel_case() {
        let dto: MessagesStatusDto =
            serde_json::from_value(json!({ "status": 3, "messageIds": [1, 2] })).unwrap();
        assert_eq!(dto.status, 3);
        assert_eq!(dto.message_ids, vec![1, 2]);
    }
}
