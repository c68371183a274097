//! Message handlers module
//!
//! Every inbound message is recorded, then routed by the sender's session
//! mode: unlink confirmation, chat mode, or the event pipeline.

use teloxide::types::Message;
use tracing::{debug, warn};

use crate::handlers::commands::{calendar, chat};
use crate::models::{LoggedPayload, MessageLogEntry, UpsertUserRequest, UserRecord};
use crate::state::{AppContext, SessionMode};
use crate::utils::errors::{Result, TimeSkedError};

const NOT_AVAILABLE: &str = "Not Available";

/// The parts of a Telegram message the handlers use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub message_id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    /// `None` for anything that is neither text nor a photo
    pub content: Option<LoggedPayload>,
}

impl InboundMessage {
    pub fn from_telegram(msg: &Message) -> Result<Self> {
        let user = msg
            .from
            .as_ref()
            .ok_or_else(|| TimeSkedError::InvalidInput("No user in message".to_string()))?;

        let content = match (msg.text(), msg.photo()) {
            (Some(text), _) => Some(LoggedPayload::Text(text.to_string())),
            (None, Some(sizes)) => sizes
                .last()
                .map(|largest| LoggedPayload::Photo { file_id: largest.file.id.clone() }),
            (None, None) => None,
        };

        Ok(Self {
            chat_id: msg.chat.id.0,
            message_id: msg.id.0,
            first_name: Some(user.first_name.clone()),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
            content,
        })
    }

    /// "first last", or "Not Available" when the sender has no name
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            parts.join(" ")
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Some(LoggedPayload::Text(text)) => Some(text),
            _ => None,
        }
    }
}

/// Create or refresh the sender's record
pub async fn register_user(ctx: &AppContext, inbound: &InboundMessage) -> Result<UserRecord> {
    ctx.store
        .upsert_user(UpsertUserRequest {
            chat_id: inbound.chat_id,
            name: Some(inbound.display_name()),
            username: inbound.username.clone(),
        })
        .await
}

/// Append the message to the log so it can be replayed by regenerate
pub async fn log_inbound(ctx: &AppContext, inbound: &InboundMessage) {
    let Some(payload) = &inbound.content else {
        return;
    };
    let entry = MessageLogEntry::new(inbound.chat_id, inbound.message_id, payload);
    if let Err(e) = ctx.store.log_message(entry).await {
        warn!(chat_id = inbound.chat_id, message_id = inbound.message_id, error = %e, "Failed to log message");
    }
}

/// Handle incoming text and photo messages
pub async fn handle_message(ctx: &AppContext, inbound: InboundMessage) -> Result<()> {
    let user = register_user(ctx, &inbound).await?;
    log_inbound(ctx, &inbound).await;

    let Some(payload) = &inbound.content else {
        debug!(chat_id = inbound.chat_id, "Ignoring message without text or photo");
        return Ok(());
    };

    match (user.session_mode(), payload) {
        (Some(SessionMode::Deleting), _) => {
            calendar::confirm_unlink(ctx, &user, inbound.text().unwrap_or_default()).await
        }
        (Some(SessionMode::Chatting), LoggedPayload::Text(text)) => chat::reply(ctx, &user, text).await,
        (Some(SessionMode::Chatting), LoggedPayload::Photo { .. }) => chat::remind_exit(ctx, user.chat_id).await,
        (None, payload) => ctx.pipeline.handle_message(&user, inbound.message_id, payload).await,
    }
}
