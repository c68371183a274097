//! Message log repository

use sqlx::PgPool;
use crate::models::message::MessageLogEntry;
use crate::utils::errors::TimeSkedError;

#[derive(Debug, Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &MessageLogEntry) -> Result<(), TimeSkedError> {
        sqlx::query(
            r#"
            INSERT INTO message_log (chat_id, message_id, kind, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (chat_id, message_id) DO NOTHING
            "#
        )
        .bind(entry.chat_id)
        .bind(entry.message_id)
        .bind(&entry.kind)
        .bind(&entry.content)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find(&self, chat_id: i64, message_id: i32) -> Result<Option<MessageLogEntry>, TimeSkedError> {
        let entry = sqlx::query_as::<_, MessageLogEntry>(
            "SELECT chat_id, message_id, kind, content, created_at FROM message_log WHERE chat_id = $1 AND message_id = $2"
        )
        .bind(chat_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    pub async fn count(&self) -> Result<i64, TimeSkedError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM message_log")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
