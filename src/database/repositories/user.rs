//! User record repository

use sqlx::{types::Json, PgPool};
use chrono::Utc;
use crate::models::chat::ChatTurn;
use crate::models::user::{Credentials, UpsertUserRequest, UserRecord};
use crate::utils::errors::TimeSkedError;

const USER_COLUMNS: &str = "chat_id, name, username, no_of_uses, access_token, refresh_token, token_expiry, \
    calendar_id, position, chat_history, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a user by chat id
    pub async fn find(&self, chat_id: i64) -> Result<Option<UserRecord>, TimeSkedError> {
        let user = sqlx::query_as::<_, UserRecord>(
            &format!("SELECT {} FROM user_records WHERE chat_id = $1", USER_COLUMNS)
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Create the user, or refresh the profile fields of an existing one
    pub async fn upsert(&self, request: UpsertUserRequest) -> Result<UserRecord, TimeSkedError> {
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            INSERT INTO user_records (chat_id, name, username, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (chat_id) DO UPDATE
            SET name = EXCLUDED.name,
                username = EXCLUDED.username,
                updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(request.chat_id)
        .bind(request.name)
        .bind(request.username)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn increment_uses(&self, chat_id: i64) -> Result<(), TimeSkedError> {
        sqlx::query("UPDATE user_records SET no_of_uses = no_of_uses + 1, updated_at = $2 WHERE chat_id = $1")
            .bind(chat_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn set_position(&self, chat_id: i64, position: Option<&str>) -> Result<(), TimeSkedError> {
        sqlx::query("UPDATE user_records SET position = $2, updated_at = $3 WHERE chat_id = $1")
            .bind(chat_id)
            .bind(position)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn set_chat_history(&self, chat_id: i64, history: Option<Vec<ChatTurn>>) -> Result<(), TimeSkedError> {
        sqlx::query("UPDATE user_records SET chat_history = $2, updated_at = $3 WHERE chat_id = $1")
            .bind(chat_id)
            .bind(history.map(Json))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Store a fresh credential pair; a missing refresh token keeps the stored one
    pub async fn store_credentials(&self, chat_id: i64, credentials: &Credentials) -> Result<(), TimeSkedError> {
        sqlx::query(
            r#"
            UPDATE user_records
            SET access_token = $2,
                refresh_token = COALESCE($3, refresh_token),
                token_expiry = $4,
                updated_at = $5
            WHERE chat_id = $1
            "#
        )
        .bind(chat_id)
        .bind(&credentials.access_token)
        .bind(credentials.refresh_token.as_deref())
        .bind(credentials.expiry)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_calendar(&self, chat_id: i64, calendar_id: &str) -> Result<(), TimeSkedError> {
        sqlx::query("UPDATE user_records SET calendar_id = $2, updated_at = $3 WHERE chat_id = $1")
            .bind(chat_id)
            .bind(calendar_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Drop the credential pair and the calendar id
    pub async fn clear_calendar_link(&self, chat_id: i64) -> Result<(), TimeSkedError> {
        sqlx::query(
            r#"
            UPDATE user_records
            SET access_token = NULL,
                refresh_token = NULL,
                token_expiry = NULL,
                calendar_id = NULL,
                updated_at = $2
            WHERE chat_id = $1
            "#
        )
        .bind(chat_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count(&self) -> Result<i64, TimeSkedError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_records")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
