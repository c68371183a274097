//! Record store abstraction consumed by the pipeline and handlers

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    ChatTurn, Credentials, EventRecord, MessageLogEntry, NewEventRecord, UpsertUserRequest,
    UserRecord,
};
use crate::state::SessionMode;
use crate::utils::errors::Result;

/// Raw row counts of the three collections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
    pub users: i64,
    pub messages: i64,
    pub events: i64,
}

/// Keyed access to user records, event records and the message log.
///
/// Writes are per-row; concurrent triggers from one user are last-write-wins.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_user(&self, chat_id: i64) -> Result<Option<UserRecord>>;
    async fn upsert_user(&self, request: UpsertUserRequest) -> Result<UserRecord>;
    async fn increment_uses(&self, chat_id: i64) -> Result<()>;
    async fn set_position(&self, chat_id: i64, mode: Option<SessionMode>) -> Result<()>;
    async fn set_chat_history(&self, chat_id: i64, history: Option<Vec<ChatTurn>>) -> Result<()>;
    async fn store_credentials(&self, chat_id: i64, credentials: &Credentials) -> Result<()>;
    async fn set_calendar(&self, chat_id: i64, calendar_id: &str) -> Result<()>;
    async fn clear_calendar_link(&self, chat_id: i64) -> Result<()>;

    async fn insert_event(&self, record: NewEventRecord) -> Result<EventRecord>;
    async fn get_event(&self, id: Uuid) -> Result<Option<EventRecord>>;
    async fn delete_event(&self, id: Uuid) -> Result<bool>;
    async fn events_for_message(&self, chat_id: i64, message_id: i32) -> Result<Vec<EventRecord>>;
    async fn upcoming_events(&self, chat_id: i64, from: NaiveDate, limit: i64) -> Result<Vec<EventRecord>>;

    async fn log_message(&self, entry: MessageLogEntry) -> Result<()>;
    async fn get_logged_message(&self, chat_id: i64, message_id: i32) -> Result<Option<MessageLogEntry>>;

    async fn counts(&self) -> Result<RecordCounts>;
}
