//! Pre-filled calendar links
//!
//! Deterministic mapping from a [`ValidatedEvent`] to a Google Calendar
//! "render?action=TEMPLATE" URL. The span rules here are shared with the
//! calendar API request body.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;
use tracing::error;

use crate::models::ValidatedEvent;

const TEMPLATE_BASE: &str = "https://www.google.com/calendar/render?action=TEMPLATE";

/// Shown in place of a link when one cannot be built
pub const LINK_FALLBACK: &str = "❌ An error has occurred. Please try again later";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpanError {
    #[error("unparsable date: {0}")]
    Date(String),
    #[error("unparsable time: {0}")]
    Time(String),
}

/// Start and end of an event as the calendar sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSpan {
    Timed { start: NaiveDateTime, end: NaiveDateTime },
    /// `end` is exclusive
    AllDay { start: NaiveDate, end: NaiveDate },
}

fn parse_date(value: &str) -> Result<NaiveDate, SpanError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| SpanError::Date(value.to_string()))
}

fn parse_time(value: &str) -> Result<NaiveTime, SpanError> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| SpanError::Time(value.to_string()))
}

impl EventSpan {
    /// Timed when a start time exists, all-day otherwise.
    ///
    /// A timed event without an end after its start lasts one hour. An all-day
    /// range ends the day after the later of the two dates.
    pub fn from_event(event: &ValidatedEvent) -> Result<Self, SpanError> {
        let start_date = parse_date(&event.start_date)?;
        let end_date = parse_date(&event.end_date)?;

        match event.start_time.as_deref() {
            Some(start_time) => {
                let start = start_date.and_time(parse_time(start_time)?);
                let end = match event.end_time.as_deref() {
                    Some(end_time) => Some(end_date.max(start_date).and_time(parse_time(end_time)?)),
                    None => None,
                }
                .filter(|end| *end > start)
                .unwrap_or(start + Duration::hours(1));

                Ok(EventSpan::Timed { start, end })
            }
            None => {
                let last = end_date.max(start_date);
                let end = last
                    .succ_opt()
                    .ok_or_else(|| SpanError::Date(event.end_date.clone()))?;
                Ok(EventSpan::AllDay { start: start_date, end })
            }
        }
    }

    /// `dates` parameter value of a template link
    pub fn as_link_dates(&self) -> String {
        match self {
            EventSpan::Timed { start, end } => format!(
                "{}/{}",
                start.format("%Y%m%dT%H%M%S"),
                end.format("%Y%m%dT%H%M%S")
            ),
            EventSpan::AllDay { start, end } => {
                format!("{}/{}", start.format("%Y%m%d"), end.format("%Y%m%d"))
            }
        }
    }
}

/// Build the template link, or report why the event has no valid span
pub fn try_calendar_link(event: &ValidatedEvent) -> Result<String, SpanError> {
    let span = EventSpan::from_event(event)?;

    let mut url = format!(
        "{}&text={}&dates={}",
        TEMPLATE_BASE,
        urlencoding::encode(&event.name),
        span.as_link_dates()
    );
    if let Some(location) = &event.location {
        url.push_str(&format!("&location={}", urlencoding::encode(location)));
    }
    if let Some(description) = &event.description {
        url.push_str(&format!("&details={}", urlencoding::encode(description)));
    }

    Ok(url)
}

/// Template link for an event; never fails, falling back to [`LINK_FALLBACK`]
pub fn to_calendar_link(event: &ValidatedEvent) -> String {
    try_calendar_link(event).unwrap_or_else(|e| {
        error!(event = %event.name, error = %e, "Could not build calendar link");
        LINK_FALLBACK.to_string()
    })
}
