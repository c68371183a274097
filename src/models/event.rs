//! Event models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// An extracted event that passed presence and format checks.
///
/// Dates are `YYYY-MM-DD`, times are 24-hour `HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedEvent {
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// A committed event, one row per event delivered to the user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventRecord {
    pub id: Uuid,
    pub chat_id: i64,
    /// Message the event was extracted from
    pub message_id: i32,
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub link: String,
    /// Only set when the event was created on a linked calendar
    pub external_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEventRecord {
    pub chat_id: i64,
    pub message_id: i32,
    pub event: ValidatedEvent,
    pub link: String,
    pub external_event_id: Option<String>,
}

impl EventRecord {
    pub fn from_new(id: Uuid, new: NewEventRecord) -> Self {
        let NewEventRecord { chat_id, message_id, event, link, external_event_id } = new;
        Self {
            id,
            chat_id,
            message_id,
            name: event.name,
            start_date: event.start_date,
            end_date: event.end_date,
            start_time: event.start_time,
            end_time: event.end_time,
            location: event.location,
            description: event.description,
            link,
            external_event_id,
            created_at: Utc::now(),
        }
    }

    pub fn event(&self) -> ValidatedEvent {
        ValidatedEvent {
            name: self.name.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            location: self.location.clone(),
            description: self.description.clone(),
        }
    }
}
