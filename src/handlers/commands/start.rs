//! Start command handler

use tracing::info;

use crate::handlers::messages::InboundMessage;
use crate::services::telegram::OutgoingText;
use crate::state::AppContext;
use crate::utils::errors::Result;

pub fn welcome_text(first_name: &str) -> String {
    format!(
        "Heyy {} ! Welcome to TimeSked 💫 \nTo start scheduling events in your calendar, simply send an event message 😊 \n\n💡Tip: Connect to your Google Calendar to let TimeSked automatically schedule events for you. /linkcalendar 👈 Tap here to link your calendar!",
        first_name
    )
}

/// Handle /start; the sender is already registered by the dispatcher
pub async fn handle_start(ctx: &AppContext, inbound: &InboundMessage) -> Result<()> {
    let first_name = inbound.first_name.as_deref().unwrap_or("there");
    ctx.transport
        .send_text(inbound.chat_id, &OutgoingText::plain(welcome_text(first_name)))
        .await?;

    info!(chat_id = inbound.chat_id, "User started TimeSked");
    Ok(())
}
