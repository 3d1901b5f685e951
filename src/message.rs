use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted direct message between two users.
/// Immutable once appended; at least one of `text`/`image_url` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /messages/send/:peer_id`. The image is inline content
/// (base64 or data URI) and is uploaded before the message is appended.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessage {
    pub text: Option<String>,
    pub image: Option<String>,
}

/// An event pushed over a live connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum PushEvent {
    /// A message was appended with the connection's user as receiver.
    NewMessage(Message),
}

impl PushEvent {
    /// Wire-level event name, as used for the SSE `event:` field.
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::NewMessage(_) => "newMessage",
        }
    }
}
