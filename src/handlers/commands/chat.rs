//! Chat mode
//!
//! After the user confirms, the upcoming events are shared with the model as
//! the opening turn and every text is answered from the stored history until
//! /cancel.

use chrono::Local;
use tracing::{error, info, warn};

use crate::handlers::commands::events::upcoming;
use crate::models::{CallbackAction, ChatTurn, EventRecord, UserRecord};
use crate::pipeline::prompts::{chat_seed, CHAT_SYSTEM_INSTRUCTION};
use crate::services::gemini::{ModelRequest, Part};
use crate::services::telegram::{edit_with_fallback, Activity, Button, Keyboard, OutgoingText};
use crate::state::{AppContext, SessionMode};
use crate::utils::errors::Result;
use crate::utils::helpers::date_cleaner;

pub const CONFIRM_PROMPT_TEXT: &str = "By clicking confirm, your 10 upcoming event details will be shared with Gemini. Your chat history will be cleared when this chat session is closed.";
pub const PREPARING_TEXT: &str = "Getting chat mode ready! TimeSked will be right with you to talk about your events. 💬🗓️";
pub const READY_TEXT: &str = "Chat mode is ready! 🎉 Ask TimeSked anything about your upcoming events. 💬🗓️";
pub const EXIT_HINT_TEXT: &str = "📌 To exit chat mode, enter: /cancel";
pub const SETUP_FAILED_TEXT: &str = "Hmm, encountering a slight glitch while setting up chat. ⚙️ Please try again in a bit";
pub const GOODBYE_TEXT: &str = "See you later! Type /chat to start a new chat. 👍";
pub const REPLY_FAILED_TEXT: &str = "❌ An error has occurred. Please try again later, Sorry for the inconvenience";

const SEED_ACKNOWLEDGEMENT: &str = "Got it! Ask me anything about these events.";

/// Handle /chat
pub async fn prompt_chat(ctx: &AppContext, chat_id: i64) -> Result<()> {
    let message = OutgoingText::plain(CONFIRM_PROMPT_TEXT)
        .with_keyboard(Keyboard::single(Button::callback("⚠️ Confirm", CallbackAction::ConfirmChat.encode())));
    ctx.transport.send_text(chat_id, &message).await?;
    Ok(())
}

/// One line per event for the opening turn
pub fn events_listing(records: &[EventRecord]) -> String {
    records
        .iter()
        .map(|record| {
            let mut line = format!("- {} on {}", record.name, date_cleaner(&record.start_date));
            if let Some(time) = &record.start_time {
                line.push_str(&format!(" at {}", time));
            }
            if let Some(location) = &record.location {
                line.push_str(&format!(" in {}", location));
            }
            if let Some(description) = &record.description {
                line.push_str(&format!(" ({})", description));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Confirm button pressed on `message_id`
pub async fn start_chat(ctx: &AppContext, chat_id: i64, message_id: i32) -> Result<()> {
    edit_with_fallback(ctx.transport.as_ref(), chat_id, message_id, &OutgoingText::plain(PREPARING_TEXT)).await?;

    match open_session(ctx, chat_id).await {
        Ok(()) => {
            edit_with_fallback(ctx.transport.as_ref(), chat_id, message_id, &OutgoingText::plain(READY_TEXT)).await?;
            let hint_id = ctx.transport.send_text(chat_id, &OutgoingText::plain(EXIT_HINT_TEXT)).await?;
            if let Err(e) = ctx.transport.pin_message(chat_id, hint_id).await {
                warn!(chat_id = chat_id, error = %e, "Failed to pin chat mode hint");
            }
            info!(chat_id = chat_id, "Chat mode started");
            Ok(())
        }
        Err(e) => {
            error!(chat_id = chat_id, error = %e, "Chat mode setup failed");
            edit_with_fallback(ctx.transport.as_ref(), chat_id, message_id, &OutgoingText::plain(SETUP_FAILED_TEXT)).await
        }
    }
}

async fn open_session(ctx: &AppContext, chat_id: i64) -> Result<()> {
    let records = upcoming(ctx, chat_id).await?;
    let history = vec![
        ChatTurn::user(chat_seed(&events_listing(&records))),
        ChatTurn::model(SEED_ACKNOWLEDGEMENT),
    ];
    ctx.store.set_chat_history(chat_id, Some(history)).await?;
    ctx.store.set_position(chat_id, Some(SessionMode::Chatting)).await
}

/// Answer one message in chat mode
pub async fn reply(ctx: &AppContext, user: &UserRecord, text: &str) -> Result<()> {
    let chat_id = user.chat_id;
    if let Err(e) = ctx.transport.send_activity(chat_id, Activity::Typing).await {
        warn!(chat_id = chat_id, error = %e, "Failed to send typing action");
    }

    let mut history = user.history();
    let request = ModelRequest {
        system_instruction: format!("{} Today is {}.", CHAT_SYSTEM_INSTRUCTION, Local::now().format("%Y-%m-%d, %A")),
        temperature: ctx.settings.gemini.chat_temperature,
        json_response: false,
        history: history.clone(),
        parts: vec![Part::Text(text.to_string())],
    };

    let answer = match ctx.model.generate(&request).await {
        Ok(answer) => answer,
        Err(e) => {
            error!(chat_id = chat_id, error = %e, "Chat reply failed");
            ctx.transport.send_text(chat_id, &OutgoingText::plain(REPLY_FAILED_TEXT)).await?;
            return Ok(());
        }
    };

    ctx.transport.send_text(chat_id, &OutgoingText::plain(answer.clone())).await?;

    history.push(ChatTurn::user(text));
    history.push(ChatTurn::model(answer));
    let store = ctx.store.clone();
    tokio::spawn(async move {
        if let Err(e) = store.set_chat_history(chat_id, Some(history)).await {
            warn!(chat_id = chat_id, error = %e, "Failed to persist chat history");
        }
    });
    Ok(())
}

/// Photos are not discussed in chat mode
pub async fn remind_exit(ctx: &AppContext, chat_id: i64) -> Result<()> {
    ctx.transport.send_text(chat_id, &OutgoingText::plain(EXIT_HINT_TEXT)).await?;
    Ok(())
}

/// Leave chat mode and forget the conversation
pub async fn end_chat(ctx: &AppContext, chat_id: i64) -> Result<()> {
    ctx.store.set_chat_history(chat_id, None).await?;
    ctx.store.set_position(chat_id, None).await?;
    ctx.transport.send_text(chat_id, &OutgoingText::plain(GOODBYE_TEXT)).await?;
    if let Err(e) = ctx.transport.unpin_all(chat_id).await {
        warn!(chat_id = chat_id, error = %e, "Failed to unpin chat mode hint");
    }
    info!(chat_id = chat_id, "Chat mode ended");
    Ok(())
}
