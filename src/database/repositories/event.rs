//! Event record repository

use sqlx::PgPool;
use chrono::NaiveDate;
use uuid::Uuid;
use crate::models::event::{EventRecord, NewEventRecord};
use crate::utils::errors::TimeSkedError;

const EVENT_COLUMNS: &str = "id, chat_id, message_id, name, start_date, end_date, start_time, end_time, \
    location, description, link, external_event_id, created_at";

#[derive(Debug, Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: NewEventRecord) -> Result<EventRecord, TimeSkedError> {
        let record = EventRecord::from_new(Uuid::new_v4(), request);

        let event = sqlx::query_as::<_, EventRecord>(&format!(
            r#"
            INSERT INTO event_records ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {cols}
            "#,
            cols = EVENT_COLUMNS
        ))
        .bind(record.id)
        .bind(record.chat_id)
        .bind(record.message_id)
        .bind(&record.name)
        .bind(&record.start_date)
        .bind(&record.end_date)
        .bind(&record.start_time)
        .bind(&record.end_time)
        .bind(&record.location)
        .bind(&record.description)
        .bind(&record.link)
        .bind(&record.external_event_id)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<EventRecord>, TimeSkedError> {
        let event = sqlx::query_as::<_, EventRecord>(
            &format!("SELECT {} FROM event_records WHERE id = $1", EVENT_COLUMNS)
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    /// Delete an event record, returning whether a row was removed
    pub async fn delete(&self, id: Uuid) -> Result<bool, TimeSkedError> {
        let result = sqlx::query("DELETE FROM event_records WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All records committed from one inbound message
    pub async fn find_by_message(&self, chat_id: i64, message_id: i32) -> Result<Vec<EventRecord>, TimeSkedError> {
        let events = sqlx::query_as::<_, EventRecord>(&format!(
            "SELECT {} FROM event_records WHERE chat_id = $1 AND message_id = $2 ORDER BY created_at",
            EVENT_COLUMNS
        ))
        .bind(chat_id)
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Events starting on or after `from`, soonest first
    pub async fn find_upcoming(&self, chat_id: i64, from: NaiveDate, limit: i64) -> Result<Vec<EventRecord>, TimeSkedError> {
        let events = sqlx::query_as::<_, EventRecord>(&format!(
            r#"
            SELECT {} FROM event_records
            WHERE chat_id = $1 AND start_date >= $2
            ORDER BY start_date ASC, start_time ASC NULLS FIRST
            LIMIT $3
            "#,
            EVENT_COLUMNS
        ))
        .bind(chat_id)
        .bind(from.format("%Y-%m-%d").to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    pub async fn count(&self) -> Result<i64, TimeSkedError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM event_records")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
