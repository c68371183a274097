//! User model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow};

use crate::models::chat::ChatTurn;
use crate::state::SessionMode;

/// One row per chat that has talked to the bot
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub chat_id: i64,
    pub name: Option<String>,
    pub username: Option<String>,
    pub no_of_uses: i64,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
    /// Presence selects the calendar delivery path
    pub calendar_id: Option<String>,
    pub position: Option<String>,
    pub chat_history: Option<Json<Vec<ChatTurn>>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertUserRequest {
    pub chat_id: i64,
    pub name: Option<String>,
    pub username: Option<String>,
}

/// OAuth credential pair as stored on the user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Unknown expiry counts as expired so the token gets refreshed before use
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= now,
            None => true,
        }
    }
}

impl UserRecord {
    pub fn new(chat_id: i64) -> Self {
        let now = Utc::now();
        Self {
            chat_id,
            name: None,
            username: None,
            no_of_uses: 0,
            access_token: None,
            refresh_token: None,
            token_expiry: None,
            calendar_id: None,
            position: None,
            chat_history: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn session_mode(&self) -> Option<SessionMode> {
        self.position.as_deref().and_then(SessionMode::parse)
    }

    pub fn has_linked_calendar(&self) -> bool {
        self.calendar_id.is_some()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.access_token.as_ref().map(|access_token| Credentials {
            access_token: access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expiry: self.token_expiry,
        })
    }

    pub fn history(&self) -> Vec<ChatTurn> {
        self.chat_history
            .as_ref()
            .map(|Json(turns)| turns.clone())
            .unwrap_or_default()
    }
}
