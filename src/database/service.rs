//! Database service layer
//!
//! This module provides a high-level interface to database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::database::store::{RecordCounts, RecordStore};
use crate::database::{DatabasePool, EventRepository, MessageRepository, UserRepository};
use crate::models::*;
use crate::state::SessionMode;
use crate::utils::errors::Result;

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pub users: UserRepository,
    pub events: EventRepository,
    pub messages: MessageRepository,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            events: EventRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
        }
    }
}

#[async_trait]
impl RecordStore for DatabaseService {
    async fn get_user(&self, chat_id: i64) -> Result<Option<UserRecord>> {
        self.users.find(chat_id).await
    }

    async fn upsert_user(&self, request: UpsertUserRequest) -> Result<UserRecord> {
        self.users.upsert(request).await
    }

    async fn increment_uses(&self, chat_id: i64) -> Result<()> {
        self.users.increment_uses(chat_id).await
    }

    async fn set_position(&self, chat_id: i64, mode: Option<SessionMode>) -> Result<()> {
        self.users.set_position(chat_id, mode.map(|m| m.as_str())).await
    }

    async fn set_chat_history(&self, chat_id: i64, history: Option<Vec<ChatTurn>>) -> Result<()> {
        self.users.set_chat_history(chat_id, history).await
    }

    async fn store_credentials(&self, chat_id: i64, credentials: &Credentials) -> Result<()> {
        self.users.store_credentials(chat_id, credentials).await
    }

    async fn set_calendar(&self, chat_id: i64, calendar_id: &str) -> Result<()> {
        self.users.set_calendar(chat_id, calendar_id).await
    }

    async fn clear_calendar_link(&self, chat_id: i64) -> Result<()> {
        self.users.clear_calendar_link(chat_id).await
    }

    async fn insert_event(&self, record: NewEventRecord) -> Result<EventRecord> {
        self.events.create(record).await
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<EventRecord>> {
        self.events.find_by_id(id).await
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool> {
        self.events.delete(id).await
    }

    async fn events_for_message(&self, chat_id: i64, message_id: i32) -> Result<Vec<EventRecord>> {
        self.events.find_by_message(chat_id, message_id).await
    }

    async fn upcoming_events(&self, chat_id: i64, from: NaiveDate, limit: i64) -> Result<Vec<EventRecord>> {
        self.events.find_upcoming(chat_id, from, limit).await
    }

    async fn log_message(&self, entry: MessageLogEntry) -> Result<()> {
        self.messages.insert(&entry).await
    }

    async fn get_logged_message(&self, chat_id: i64, message_id: i32) -> Result<Option<MessageLogEntry>> {
        self.messages.find(chat_id, message_id).await
    }

    async fn counts(&self) -> Result<RecordCounts> {
        let (users, messages, events) = futures::try_join!(
            self.users.count(),
            self.messages.count(),
            self.events.count(),
        )?;

        Ok(RecordCounts { users, messages, events })
    }
}
