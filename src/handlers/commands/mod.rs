//! Command handlers module
//!
//! This module contains handlers for all bot commands like /start, /chat, etc.

pub mod calendar;
pub mod chat;
pub mod events;
pub mod start;

use teloxide::utils::command::BotCommands;
use tracing::debug;

use crate::handlers::messages::{log_inbound, register_user, InboundMessage};
use crate::models::UserRecord;
use crate::services::telegram::OutgoingText;
use crate::state::{AppContext, SessionMode};
use crate::utils::errors::Result;

pub const NOTHING_TO_CANCEL_TEXT: &str = "Nothing to cancel 👋";

/// All available bot commands
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "TimeSked commands:")]
pub enum Command {
    #[command(description = "Start TimeSked")]
    Start,
    #[command(description = "Show your upcoming events")]
    ViewEvents,
    #[command(description = "Talk to TimeSked about your events")]
    Chat,
    #[command(description = "Link your Google Calendar")]
    LinkCalendar,
    #[command(description = "Unlink your Google Calendar")]
    UnlinkCalendar,
    #[command(description = "Leave chat mode or cancel an unlink")]
    Cancel,
}

impl Command {
    /// The command as typed, used when a session mode takes it as plain text
    pub fn as_text(&self) -> &'static str {
        match self {
            Command::Start => "/start",
            Command::ViewEvents => "/viewevents",
            Command::Chat => "/chat",
            Command::LinkCalendar => "/linkcalendar",
            Command::UnlinkCalendar => "/unlinkcalendar",
            Command::Cancel => "/cancel",
        }
    }
}

/// Main command dispatcher.
///
/// A pending unlink takes any input as its answer; chat mode only honours /cancel.
pub async fn handle_command(ctx: &AppContext, inbound: InboundMessage, cmd: Command) -> Result<()> {
    let user = register_user(ctx, &inbound).await?;
    log_inbound(ctx, &inbound).await;
    debug!(chat_id = user.chat_id, command = ?cmd, mode = ?user.session_mode(), "Processing command");

    match (user.session_mode(), cmd) {
        (_, Command::Cancel) => handle_cancel(ctx, &user).await,
        (Some(SessionMode::Deleting), cmd) => calendar::confirm_unlink(ctx, &user, cmd.as_text()).await,
        (Some(SessionMode::Chatting), cmd) => chat::reply(ctx, &user, cmd.as_text()).await,
        (None, Command::Start) => start::handle_start(ctx, &inbound).await,
        (None, Command::ViewEvents) => events::send_event_list(ctx, user.chat_id).await,
        (None, Command::Chat) => chat::prompt_chat(ctx, user.chat_id).await,
        (None, Command::LinkCalendar) => calendar::link_calendar(ctx, &user).await,
        (None, Command::UnlinkCalendar) => calendar::request_unlink(ctx, &user).await,
    }
}

/// Leave whichever session mode is active
pub async fn handle_cancel(ctx: &AppContext, user: &UserRecord) -> Result<()> {
    match user.session_mode() {
        Some(SessionMode::Chatting) => chat::end_chat(ctx, user.chat_id).await,
        Some(SessionMode::Deleting) => calendar::cancel_unlink(ctx, user.chat_id).await,
        None => {
            ctx.transport
                .send_text(user.chat_id, &OutgoingText::plain(NOTHING_TO_CANCEL_TEXT))
                .await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_parse_lowercase() {
        assert_eq!(Command::parse("/viewevents", "TimeSkedBot").unwrap(), Command::ViewEvents);
        assert_eq!(Command::parse("/linkcalendar", "TimeSkedBot").unwrap(), Command::LinkCalendar);
        assert_eq!(Command::parse("/cancel", "TimeSkedBot").unwrap(), Command::Cancel);
        assert!(Command::parse("/help", "TimeSkedBot").is_err());
    }

    #[test]
    fn test_as_text_matches_parser() {
        for cmd in [
            Command::Start,
            Command::ViewEvents,
            Command::Chat,
            Command::LinkCalendar,
            Command::UnlinkCalendar,
            Command::Cancel,
        ] {
            assert_eq!(Command::parse(cmd.as_text(), "TimeSkedBot").unwrap(), cmd);
        }
    }
}
