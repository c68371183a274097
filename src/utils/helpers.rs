//! Helper functions and utilities
//!
//! Text escaping for the Telegram parse modes and human readable date/time
//! formatting used by the summaries and the event browser.

use chrono::{NaiveDate, NaiveTime};

/// Escape every MarkdownV2 special character
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '='
                | '|' | '{' | '}' | '.' | '!'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Escape the target of an inline MarkdownV2 link, where only `)` and `\` are special
pub fn escape_markdown_url(url: &str) -> String {
    url.replace('\\', r"\\").replace(')', r"\)")
}

/// Escape text for the HTML parse mode
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render `YYYY-MM-DD` as e.g. `Monday, 10-March-2025`; unparsable input is returned as-is
pub fn date_cleaner(date: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%A, %d-%B-%Y").to_string())
        .unwrap_or_else(|_| date.to_string())
}

/// Render `HH:MM` as a 12-hour clock time, e.g. `02:00 PM`
pub fn time_cleaner(time: &str) -> String {
    NaiveTime::parse_from_str(time, "%H:%M")
        .map(|t| t.format("%I:%M %p").to_string())
        .unwrap_or_else(|_| time.to_string())
}

/// Truncate to at most `max_bytes` bytes without splitting a character
pub fn truncate_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
