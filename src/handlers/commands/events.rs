//! Upcoming event list, event details and deletion

use chrono::Local;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{CallbackAction, EventRecord};
use crate::services::telegram::{edit_with_fallback, Button, Keyboard, OutgoingText};
use crate::state::AppContext;
use crate::utils::errors::{Result, TimeSkedError};
use crate::utils::helpers::{date_cleaner, escape_html, time_cleaner};

pub const NO_EVENTS_TEXT: &str =
    "<b>No upcoming events</b>\nPlease schedule events using TimeSked to view it here !";
pub const EVENT_DELETED_TEXT: &str = "Event deleted! ✅";
pub const EVENT_GONE_TEXT: &str = "This event no longer exists";

/// Next events of the chat, soonest first
pub async fn upcoming(ctx: &AppContext, chat_id: i64) -> Result<Vec<EventRecord>> {
    ctx.store
        .upcoming_events(chat_id, Local::now().date_naive(), ctx.settings.pipeline.upcoming_limit)
        .await
}

/// Numbered list with one button per event
pub fn list_view(records: &[EventRecord], per_row: usize) -> OutgoingText {
    if records.is_empty() {
        return OutgoingText::html(NO_EVENTS_TEXT);
    }

    let mut text = String::from("<b><u>Upcoming events are</u></b>\n");
    for (i, record) in records.iter().enumerate() {
        text.push_str(&format!(
            "\n{}. <b>{}</b> on <i>{}</i>",
            i + 1,
            escape_html(&record.name),
            date_cleaner(&record.start_date)
        ));
    }

    let buttons: Vec<Button> = (0..records.len())
        .map(|index| Button::callback((index + 1).to_string(), CallbackAction::ViewEvent { index }.encode()))
        .collect();
    let rows = buttons.chunks(per_row.max(1)).map(<[Button]>::to_vec).collect();

    OutgoingText::html(text).with_keyboard(Keyboard::new(rows))
}

/// Details of one event with link, delete and back buttons
pub fn detail_view(record: &EventRecord) -> OutgoingText {
    let mut text = String::from("<b><u>Event Details</u></b>");
    text.push_str(&format!("\n\n<b>Event name :</b> {}", escape_html(&record.name)));
    text.push_str(&format!("\n\n<b>Starting Date :</b> {}", date_cleaner(&record.start_date)));
    if record.end_date != record.start_date {
        text.push_str(&format!("\n\n<b>Ending Date :</b> {}", date_cleaner(&record.end_date)));
    }
    if let Some(start_time) = &record.start_time {
        text.push_str(&format!("\n\n<b>Starting Time :</b> {}", time_cleaner(start_time)));
    }
    if let Some(end_time) = &record.end_time {
        text.push_str(&format!("\n\n<b>Ending Time :</b> {}", time_cleaner(end_time)));
    }
    if let Some(location) = &record.location {
        text.push_str(&format!("\n\n<b>Location :</b> {}", escape_html(location)));
    }
    if let Some(description) = &record.description {
        text.push_str(&format!("\n\n<b>Description :</b>\n{}", escape_html(description)));
    }

    let mut keyboard = Keyboard::default();
    if record.link.starts_with("http") {
        keyboard.push_row(vec![Button::url("🔗 Event Link", record.link.clone())]);
    }
    keyboard.push_row(vec![Button::callback(
        "🗑 Delete this event",
        CallbackAction::DeleteEvent { record_id: record.id }.encode(),
    )]);
    keyboard.push_row(vec![Button::callback("<< Back to event list", CallbackAction::BackToList.encode())]);

    OutgoingText::html(text).with_keyboard(keyboard)
}

/// Handle /viewevents
pub async fn send_event_list(ctx: &AppContext, chat_id: i64) -> Result<()> {
    let records = upcoming(ctx, chat_id).await?;
    let message = list_view(&records, ctx.settings.pipeline.events_per_row);
    ctx.transport.send_text(chat_id, &message).await?;
    Ok(())
}

/// Replace `message_id` with the event list
pub async fn show_list(ctx: &AppContext, chat_id: i64, message_id: i32) -> Result<()> {
    let records = upcoming(ctx, chat_id).await?;
    let message = list_view(&records, ctx.settings.pipeline.events_per_row);
    edit_with_fallback(ctx.transport.as_ref(), chat_id, message_id, &message).await
}

/// Replace `message_id` with the details of the `index`-th upcoming event.
///
/// Returns false when the list changed and the entry is gone.
pub async fn show_event(ctx: &AppContext, chat_id: i64, message_id: i32, index: usize) -> Result<bool> {
    let records = upcoming(ctx, chat_id).await?;
    match records.get(index) {
        Some(record) => {
            edit_with_fallback(ctx.transport.as_ref(), chat_id, message_id, &detail_view(record)).await?;
            Ok(true)
        }
        None => {
            show_list(ctx, chat_id, message_id).await?;
            Ok(false)
        }
    }
}

/// Delete an event record and its calendar event, then show the list again
pub async fn delete_event(ctx: &AppContext, chat_id: i64, message_id: i32, record_id: Uuid) -> Result<bool> {
    let Some(record) = ctx.store.get_event(record_id).await? else {
        show_list(ctx, chat_id, message_id).await?;
        return Ok(false);
    };
    if record.chat_id != chat_id {
        return Err(TimeSkedError::InvalidInput(format!(
            "Event {} does not belong to chat {}",
            record_id, chat_id
        )));
    }

    if let Some(external_id) = &record.external_event_id {
        remove_from_calendar(ctx, chat_id, external_id).await;
    }

    ctx.store.delete_event(record_id).await?;
    info!(chat_id = chat_id, record_id = %record_id, "Event deleted");

    show_list(ctx, chat_id, message_id).await?;
    Ok(true)
}

async fn remove_from_calendar(ctx: &AppContext, chat_id: i64, external_id: &str) {
    let user = match ctx.store.get_user(chat_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return,
        Err(e) => {
            warn!(chat_id = chat_id, error = %e, "Could not load user for calendar delete");
            return;
        }
    };
    let Some(calendar_id) = user.calendar_id.clone() else {
        warn!(chat_id = chat_id, event_id = %external_id, "Calendar no longer linked, event left in place");
        return;
    };

    let result = match ctx.reconciler.valid_credentials(&user).await {
        Ok(credentials) => ctx
            .calendar
            .delete_event(&credentials.access_token, &calendar_id, external_id)
            .await
            .map_err(TimeSkedError::from),
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        warn!(chat_id = chat_id, event_id = %external_id, error = %e, "Could not delete calendar event");
    }
}
