//! Google Calendar linking and unlinking

use tracing::{error, info, warn};

use crate::models::UserRecord;
use crate::services::telegram::{Button, Keyboard, OutgoingText};
use crate::state::{AppContext, SessionMode};
use crate::utils::errors::{Result, TimeSkedError};

pub const LINK_TEXT: &str = "To add events seamlessly, TimeSked needs to connect with your Google Calendar. Click below to grant access! Don't worry, TimeSked can only create a dedicated calendar and add, view, or delete events within it. Your existing event details remain private. 👍";
pub const ALREADY_LINKED_TEXT: &str = "No need to sign in again 😊 Your calendar is already registered with TimeSked, new events will be automatically added to your calendar!";
pub const AUTH_FAILED_TEXT: &str = "Authorisation failed, Please try again later";
pub const UNLINK_WARNING_TEXT: &str = "⚠️ Warning: Unlinking will permanently revoke TimeSked's access to your Google Calendar. TimeSked will no longer be able to create, view, or delete events on your behalf. This action cannot be reversed. 🤔 \n\nTo confirm deletion, please type 'CONFIRM'. Typing anything else will cancel the operation.";
pub const NO_CALENDAR_TEXT: &str = "There are no calendars associated with your account at this time. If you add a calendar later, you can delete it here. 🗑️";
pub const UNLINKED_TEXT: &str = "👋 Okay, I've unlinked your Google Calendar from TimeSked. \nJust a heads-up: TimeSked does not have permission to delete calendars automatically. If you want to remove the TimeSked calendar completely, you can do that directly in your Google Calendar settings.";
pub const UNLINK_CANCELLED_TEXT: &str = "🎉 The delete operation was canceled. Your calendar and events remain unchanged. ";
pub const LINKED_TEXT: &str = "Your account has been successfully linked, and a dedicated calendar has been set up. All your events will land right there. 🎯🗓️";
pub const LINK_ERROR_TEXT: &str = "An error occurred, please sign in again";

const CONFIRM_WORD: &str = "CONFIRM";

async fn send(ctx: &AppContext, chat_id: i64, text: &str) -> Result<()> {
    ctx.transport.send_text(chat_id, &OutgoingText::plain(text)).await?;
    Ok(())
}

/// Handle /linkcalendar
pub async fn link_calendar(ctx: &AppContext, user: &UserRecord) -> Result<()> {
    if user.has_linked_calendar() {
        return send(ctx, user.chat_id, ALREADY_LINKED_TEXT).await;
    }

    let url = ctx.calendar.authorization_url(&user.chat_id.to_string());
    let message = OutgoingText::plain(LINK_TEXT).with_keyboard(Keyboard::single(Button::url("🔗 Link", url)));

    if let Err(e) = ctx.transport.send_text(user.chat_id, &message).await {
        error!(chat_id = user.chat_id, error = %e, "Failed to send authorization link");
        return send(ctx, user.chat_id, AUTH_FAILED_TEXT).await;
    }
    Ok(())
}

/// Handle /unlinkcalendar: ask for confirmation and wait in `DELETING` mode
pub async fn request_unlink(ctx: &AppContext, user: &UserRecord) -> Result<()> {
    if !user.has_linked_calendar() {
        return send(ctx, user.chat_id, NO_CALENDAR_TEXT).await;
    }

    ctx.store.set_position(user.chat_id, Some(SessionMode::Deleting)).await?;
    send(ctx, user.chat_id, UNLINK_WARNING_TEXT).await
}

/// Answer to the unlink warning; anything but `CONFIRM` cancels
pub async fn confirm_unlink(ctx: &AppContext, user: &UserRecord, answer: &str) -> Result<()> {
    ctx.store.set_position(user.chat_id, None).await?;

    if answer.trim() != CONFIRM_WORD {
        info!(chat_id = user.chat_id, "Unlink cancelled");
        return send(ctx, user.chat_id, UNLINK_CANCELLED_TEXT).await;
    }

    if let Some(credentials) = user.credentials() {
        let token = credentials.refresh_token.as_deref().unwrap_or(&credentials.access_token);
        if let Err(e) = ctx.calendar.revoke(token).await {
            warn!(chat_id = user.chat_id, error = %e, "Token revocation failed, clearing the link anyway");
        }
    }

    ctx.store.clear_calendar_link(user.chat_id).await?;
    info!(chat_id = user.chat_id, "Calendar unlinked");
    send(ctx, user.chat_id, UNLINKED_TEXT).await
}

/// /cancel while the unlink warning is pending
pub async fn cancel_unlink(ctx: &AppContext, chat_id: i64) -> Result<()> {
    ctx.store.set_position(chat_id, None).await?;
    send(ctx, chat_id, UNLINK_CANCELLED_TEXT).await
}

/// Finish the OAuth flow started by /linkcalendar.
///
/// `state` carries the chat id. The chat is told about the outcome either way.
pub async fn complete_oauth(ctx: &AppContext, code: &str, state: &str) -> Result<()> {
    let chat_id: i64 = state
        .trim()
        .parse()
        .map_err(|_| TimeSkedError::InvalidInput(format!("Invalid OAuth state: {}", state)))?;

    match link_account(ctx, chat_id, code).await {
        Ok(calendar_id) => {
            info!(chat_id = chat_id, calendar_id = %calendar_id, "Calendar linked");
            send(ctx, chat_id, LINKED_TEXT).await
        }
        Err(e) => {
            error!(chat_id = chat_id, error = %e, "OAuth callback failed");
            if let Err(send_error) = send(ctx, chat_id, LINK_ERROR_TEXT).await {
                warn!(chat_id = chat_id, error = %send_error, "Could not report OAuth failure");
            }
            Err(e)
        }
    }
}

async fn link_account(ctx: &AppContext, chat_id: i64, code: &str) -> Result<String> {
    ctx.store
        .get_user(chat_id)
        .await?
        .ok_or_else(|| TimeSkedError::NotFound(format!("user {}", chat_id)))?;

    let credentials = ctx.calendar.exchange_code(code).await?;
    ctx.store.store_credentials(chat_id, &credentials).await?;

    let calendar_id = ctx.calendar.create_calendar(&credentials.access_token).await?;
    ctx.store.set_calendar(chat_id, &calendar_id).await?;
    Ok(calendar_id)
}
