//! Message log model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

pub const KIND_TEXT: &str = "text";
pub const KIND_PHOTO: &str = "photo";

/// One row per inbound message, used to replay a message on regenerate
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MessageLogEntry {
    pub chat_id: i64,
    pub message_id: i32,
    pub kind: String,
    /// Message text, or the Telegram file id for photos
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// What an inbound message carried
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoggedPayload {
    Text(String),
    Photo { file_id: String },
}

impl LoggedPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            LoggedPayload::Text(_) => KIND_TEXT,
            LoggedPayload::Photo { .. } => KIND_PHOTO,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            LoggedPayload::Text(text) => text,
            LoggedPayload::Photo { file_id } => file_id,
        }
    }
}

impl MessageLogEntry {
    pub fn new(chat_id: i64, message_id: i32, payload: &LoggedPayload) -> Self {
        Self {
            chat_id,
            message_id,
            kind: payload.kind().to_string(),
            content: payload.content().to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn payload(&self) -> LoggedPayload {
        if self.kind == KIND_PHOTO {
            LoggedPayload::Photo { file_id: self.content.clone() }
        } else {
            LoggedPayload::Text(self.content.clone())
        }
    }
}
