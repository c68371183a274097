//! Callback query handlers module
//!
//! Button data is decoded once into a [`CallbackAction`]; the reply says how
//! the callback query itself should be answered.

use tracing::{debug, info, warn};

use crate::handlers::commands::{chat, events};
use crate::models::CallbackAction;
use crate::services::telegram::Activity;
use crate::state::AppContext;
use crate::utils::errors::Result;

pub const LOCATION_NOT_FOUND_TEXT: &str = "Sorry, TimeSked couldn't find that place on the map 🗺️";

/// A pressed inline button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackInput {
    pub chat_id: i64,
    /// The message carrying the button
    pub message_id: i32,
    /// Current text of that message, if Telegram sent it
    pub message_text: Option<String>,
    pub data: String,
}

/// How to answer the callback query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackReply {
    pub text: Option<String>,
    pub alert: bool,
}

impl CallbackReply {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), alert: true }
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), alert: false }
    }
}

/// Main callback query dispatcher
pub async fn handle_callback(ctx: &AppContext, input: CallbackInput) -> Result<CallbackReply> {
    let action = match input.data.parse::<CallbackAction>() {
        Ok(action) => action,
        Err(e) => {
            warn!(chat_id = input.chat_id, data = %input.data, error = %e, "Ignoring unknown callback");
            return Ok(CallbackReply::silent());
        }
    };
    debug!(chat_id = input.chat_id, action = ?action, "Routing callback");

    match action {
        CallbackAction::Regenerate { message_id } => {
            info!(chat_id = input.chat_id, message_id = message_id, "Regenerate requested");
            let previous = input.message_text.as_deref().unwrap_or_default();
            ctx.pipeline
                .regenerate(input.chat_id, input.message_id, message_id, previous)
                .await?;
            Ok(CallbackReply::silent())
        }
        CallbackAction::Location { query } => send_location(ctx, input.chat_id, &query).await,
        CallbackAction::ViewEvent { index } => {
            if events::show_event(ctx, input.chat_id, input.message_id, index).await? {
                Ok(CallbackReply::silent())
            } else {
                Ok(CallbackReply::notice(events::EVENT_GONE_TEXT))
            }
        }
        CallbackAction::DeleteEvent { record_id } => {
            if events::delete_event(ctx, input.chat_id, input.message_id, record_id).await? {
                Ok(CallbackReply::alert(events::EVENT_DELETED_TEXT))
            } else {
                Ok(CallbackReply::notice(events::EVENT_GONE_TEXT))
            }
        }
        CallbackAction::BackToList => {
            events::show_list(ctx, input.chat_id, input.message_id).await?;
            Ok(CallbackReply::silent())
        }
        CallbackAction::ConfirmChat => {
            chat::start_chat(ctx, input.chat_id, input.message_id).await?;
            Ok(CallbackReply::silent())
        }
    }
}

async fn send_location(ctx: &AppContext, chat_id: i64, query: &str) -> Result<CallbackReply> {
    if let Err(e) = ctx.transport.send_activity(chat_id, Activity::FindingLocation).await {
        warn!(chat_id = chat_id, error = %e, "Failed to send location action");
    }

    match ctx.weather.locate(query).await? {
        Some(place) => {
            ctx.transport.send_venue(chat_id, &place).await?;
            Ok(CallbackReply::silent())
        }
        None => Ok(CallbackReply::alert(LOCATION_NOT_FOUND_TEXT)),
    }
}
