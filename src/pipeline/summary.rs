//! Final summaries shown in place of the progress message

use crate::models::CallbackAction;
use crate::pipeline::link::LINK_FALLBACK;
use crate::pipeline::reconcile::{CommittedEvent, DeliveryPath, SummaryItem};
use crate::pipeline::validation::RejectionReason;
use crate::services::telegram::{Button, Keyboard, OutgoingText};
use crate::utils::helpers::{date_cleaner, escape_markdown, escape_markdown_url};

pub const TRANSIENT_FAILURE_TEXT: &str =
    "Gemini is currently experiencing a temporary hiccup. Please try again in a little while.";
pub const EXHAUSTED_TEXT: &str = "All attempts to extract event details failed, sorry for the incovenience caused. Please try again later";
pub const NO_EVENTS_TEXT: &str = "Oops! Looks like that message is missing some key event details. Please try again, and I'll get it added to your calendar. 🗓️";
pub const RELINK_TEXT: &str = "TimeSked can no longer reach your Google Calendar 🔒 Please link it again with /linkcalendar and resend your event.";
pub const GENERIC_ERROR_TEXT: &str = "❌ An error has occurred. Please try again later, Sorry for the inconvenience";
pub const PHOTO_FAILED_TEXT: &str = "Opening the photo failed, Please send it again";
pub const REGENERATE_FAILED_PREFIX: &str =
    "An error occurred while regenerating. TimeSked's previous response has been restored \n\n";

const REJECTION_HINT: &str = "📅 Please check your input and try again.\n\nIf you feel this is incorrect, Please click on the 'Regenerate' button given below 👇.";

/// Terminal text for a lone rejected event
pub fn rejection_text(reason: &RejectionReason) -> String {
    format!("{}{}", reason, REJECTION_HINT)
}

fn link_markup(link: &str) -> String {
    if link == LINK_FALLBACK {
        escape_markdown(link)
    } else {
        format!("[Event Link]({})", escape_markdown_url(link))
    }
}

fn single_event(path: &DeliveryPath, committed: &CommittedEvent, suggestion: Option<&str>) -> String {
    let event = &committed.event;
    let mut text = if path.is_calendar() {
        String::from("🎉 Your event has been added to your calendar\\! \n\n")
    } else {
        String::from("Here's the pre\\-filled link to your 📅 calendar event\\: ✨\n\n")
    };

    text.push_str(&format!("\t🗓️ Event\\: {} \n\n", escape_markdown(&event.name)));
    text.push_str(&format!("\t📅 Date\\: {} \n\n", escape_markdown(&date_cleaner(&event.start_date))));

    if let (Some(suggestion), Some(location)) = (suggestion, event.location.as_deref()) {
        text.push_str(&format!("\t📍 Location\\: {} \n\n", escape_markdown(location)));
        text.push_str(&format!("\t🔗 Event Link\\: {} \n\n", link_markup(&committed.link)));
        text.push_str(&format!("{} \n\n", escape_markdown(suggestion)));
    } else {
        text.push_str(&format!("\t🔗 Event Link\\: {} \n\n", link_markup(&committed.link)));
    }

    text.push_str("Enjoy your event\\!");
    text
}

fn event_list(path: &DeliveryPath, items: &[SummaryItem]) -> String {
    let mut text = if path.is_calendar() {
        String::from("🎉 Here are the details to your events ✨ \nAll the valid events have been added to your calendar\\! \n")
    } else {
        String::from("Here's the details to your 📅 calendar events\\: \nClick on the link to add it to your calendar \n")
    };

    for (i, item) in items.iter().enumerate() {
        let number = i + 1;
        match item {
            SummaryItem::Rejected(reason) => {
                text.push_str(&format!("\n📅 Event \\#{}\n{}\n", number, escape_markdown(&reason.to_string())));
            }
            SummaryItem::Committed(committed) => {
                let event = &committed.event;
                text.push_str(&format!(
                    "\n📅 Event \\#{} \n{} \n{}  {} \n",
                    number,
                    escape_markdown(&event.name),
                    escape_markdown(&date_cleaner(&event.start_date)),
                    escape_markdown(event.start_time.as_deref().unwrap_or_default()),
                ));
                if let Some(location) = &event.location {
                    text.push_str(&format!("Location \\: {} \n", escape_markdown(location)));
                }
                text.push_str(&format!("Link \\: {}\n", link_markup(&committed.link)));
            }
        }
    }

    text
}

/// MarkdownV2 summary of a reconciled batch.
///
/// `suggestion` is only shown for a single committed event with a location.
pub fn render_summary(path: &DeliveryPath, items: &[SummaryItem], suggestion: Option<&str>) -> String {
    match items {
        [SummaryItem::Committed(committed)] => single_event(path, committed, suggestion),
        _ => event_list(path, items),
    }
}

/// Buttons under every terminal message
pub fn final_keyboard(received_message_id: i32, location: Option<&str>) -> Keyboard {
    let mut keyboard = Keyboard::single(Button::callback(
        "🔁 Regenerate",
        CallbackAction::Regenerate { message_id: received_message_id }.encode(),
    ));
    if let Some(location) = location {
        keyboard.push_row(vec![Button::callback(
            "📍 Location",
            CallbackAction::location(location).encode(),
        )]);
    }
    keyboard
}

/// Plain terminal message with the regenerate button
pub fn terminal_text(text: impl Into<String>, received_message_id: i32) -> OutgoingText {
    OutgoingText::plain(text).with_keyboard(final_keyboard(received_message_id, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValidatedEvent;

    fn committed(name: &str, location: Option<&str>, link: &str) -> SummaryItem {
        SummaryItem::Committed(CommittedEvent {
            event: ValidatedEvent {
                name: name.to_string(),
                start_date: "2025-03-10".to_string(),
                end_date: "2025-03-10".to_string(),
                start_time: Some("14:00".to_string()),
                end_time: None,
                location: location.map(str::to_string),
                description: None,
            },
            link: link.to_string(),
            external_event_id: None,
            record_id: None,
        })
    }

    #[test]
    fn test_single_link_event_with_suggestion() {
        let items = vec![committed("Tech-Talk", Some("CUSAT"), "https://example.com/x")];
        let text = render_summary(&DeliveryPath::Link, &items, Some("It will be warm."));

        assert!(text.starts_with("Here's the pre\\-filled link"));
        assert!(text.contains("🗓️ Event\\: Tech\\-Talk"));
        assert!(text.contains("📅 Date\\: Monday, 10\\-March\\-2025"));
        assert!(text.contains("📍 Location\\: CUSAT"));
        assert!(text.contains("[Event Link](https://example.com/x)"));
        assert!(text.contains("It will be warm\\."));
        assert!(text.ends_with("Enjoy your event\\!"));
    }

    #[test]
    fn test_single_calendar_event_without_suggestion_hides_location() {
        let items = vec![committed("Demo", Some("Hall"), "https://calendar.google.com/e")];
        let text = render_summary(
            &DeliveryPath::Calendar { calendar_id: "c".to_string() },
            &items,
            None,
        );
        assert!(text.starts_with("🎉 Your event has been added to your calendar\\!"));
        assert!(!text.contains("📍 Location"));
    }

    #[test]
    fn test_list_numbers_committed_and_rejected_items() {
        let items = vec![
            committed("A", None, "https://example.com/a"),
            SummaryItem::Rejected(RejectionReason::MissingName),
            committed("C", Some("Pune"), LINK_FALLBACK),
        ];
        let text = render_summary(&DeliveryPath::Link, &items, None);

        assert!(text.contains("📅 Event \\#1 \nA"));
        assert!(text.contains("📅 Event \\#2\nThe message does not contain the name of the event\\."));
        assert!(text.contains("📅 Event \\#3 \nC"));
        assert!(text.contains("Location \\: Pune"));
        assert!(text.contains(&escape_markdown(LINK_FALLBACK)));
    }

    #[test]
    fn test_final_keyboard_rows() {
        let keyboard = final_keyboard(42, Some("CUSAT"));
        assert_eq!(keyboard.callback_data(), vec!["regenerate:42", "location:CUSAT"]);
        assert_eq!(final_keyboard(42, None).rows.len(), 1);
    }

    #[test]
    fn test_rejection_text() {
        let text = rejection_text(&RejectionReason::MissingDate);
        assert!(text.starts_with("The message does not contain the date of the event.📅"));
    }
}
