//! Instruction templates for the generative model

use chrono::NaiveDate;

pub const EXTRACTION_SYSTEM_INSTRUCTION: &str = "You extract events from messages and images. \
Answer with a JSON array only. Each element is an array of exactly 7 strings: \
name, start date (YYYY-MM-DD), end date (YYYY-MM-DD), start time (HH:MM, 24-hour), \
end time (HH:MM, 24-hour), location, description. Use the string \"None\" for any \
field that is not available. If there is no event, answer with []. Never invent example events.";

pub const CHAT_SYSTEM_INSTRUCTION: &str = "You are TimeSked, a friendly assistant that helps the \
user with their upcoming events. The first message lists the user's upcoming events. Answer \
briefly, format replies with Telegram MarkdownV2, and remind the user that they can type \
/cancel to leave the chat.";

/// Extraction instruction for one request, anchored on today's date
pub fn extraction_prompt(today: NaiveDate) -> String {
    format!(
        "Act as a professional event extractor. The message or image below describes one or more \
events. Return a nested JSON array where every inner array describes one event, in this order:\n\
\n\
* The name of the event.\n\
* The start date in YYYY-MM-DD format.\n\
* The end date in YYYY-MM-DD format.\n\
* The start time in 24-hour format (e.g. 14:00).\n\
* The end time in 24-hour format (e.g. 15:00).\n\
* The location of the event.\n\
* A brief description of at most 50 words, including registration links and fees when mentioned.\n\
\n\
Use \"None\" for every detail that is not available.\n\
\n\
Dates:\n\
* Convert explicit dates to YYYY-MM-DD.\n\
* For a weekday such as Monday, use its next occurrence. Today is {date}, a {weekday}.\n\
* A deadline, last date, due date or submission date is the start date when no other start date is given.\n\
* An impossible date such as 25/40/2024 must become \"None\". Do not correct it.\n\
\n\
Times:\n\
* Convert AM/PM to 24-hour format (7 PM is 19:00, 9:30 AM is 09:30).\n\
* When only an hour is given, use the start of that hour.\n\
\n\
Location:\n\
* Prefer the college or venue name; otherwise use the most specific place mentioned.\n\
\n\
If the message is not about an event, answer []. An event needs at least a name and a start date. \
Every inner array must have exactly 7 elements. Output the JSON array and nothing else.\n",
        date = today.format("%Y-%m-%d"),
        weekday = today.format("%A"),
    )
}

/// Opening turn of a chat session, listing the user's upcoming events
pub fn chat_seed(events_listing: &str) -> String {
    if events_listing.is_empty() {
        "I have no upcoming events saved.".to_string()
    } else {
        format!("These are my upcoming events:\n{}", events_listing)
    }
}
