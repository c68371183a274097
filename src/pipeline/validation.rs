//! Validation and repair of raw extraction tuples
//!
//! The model answers with 7-element tuples
//! `(name, start_date, end_date, start_time, end_time, location, description)`
//! where any field may be the literal `"None"`. This module turns one tuple
//! into a [`ValidatedEvent`] or a [`RejectionReason`], and applies that per
//! item over a whole reply while keeping the model's ordering.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::ValidatedEvent;

/// Token the model uses for a missing field
pub const ABSENT: &str = "None";

/// Number of fields in a well-formed tuple
pub const TUPLE_ARITY: usize = 7;

/// One tuple as parsed from the model reply, before any interpretation
pub type RawEventTuple = Vec<Option<String>>;

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern compiles"))
}

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-2][0-9]:[0-5][0-9]$").expect("time pattern compiles"))
}

/// Why a tuple was not turned into an event. Shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    /// Tuple did not have exactly seven fields
    Malformed { got: usize },
    MissingName,
    MissingDate,
    InvalidDate { start: Option<String>, end: Option<String> },
    InvalidTime { start: Option<String>, end: Option<String> },
}

fn shown(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(ABSENT)
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::Malformed { got } => write!(
                f,
                "Event doesn't have the complete details! Expected {} got {}.",
                TUPLE_ARITY, got
            ),
            RejectionReason::MissingName => {
                f.write_str("The message does not contain the name of the event.")
            }
            RejectionReason::MissingDate => {
                f.write_str("The message does not contain the date of the event.")
            }
            RejectionReason::InvalidDate { start, end } => write!(
                f,
                "An error occurred while validating dates. {} & {}",
                shown(start),
                shown(end)
            ),
            RejectionReason::InvalidTime { start, end } => write!(
                f,
                "An error occurred while validating time. {} & {}",
                shown(start),
                shown(end)
            ),
        }
    }
}

/// The seven fields with the absent token already mapped to `None`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFields {
    pub name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

fn present(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty() && *value != ABSENT)
        .map(str::to_string)
}

impl EventFields {
    /// Map a raw tuple onto named fields; any arity other than seven is a hard rejection
    pub fn from_raw(raw: &[Option<String>]) -> Result<Self, RejectionReason> {
        if raw.len() != TUPLE_ARITY {
            return Err(RejectionReason::Malformed { got: raw.len() });
        }

        Ok(Self {
            name: present(&raw[0]),
            start_date: present(&raw[1]),
            end_date: present(&raw[2]),
            start_time: present(&raw[3]),
            end_time: present(&raw[4]),
            location: present(&raw[5]),
            description: present(&raw[6]),
        })
    }

    /// True when the model produced a tuple with nothing in it
    pub fn is_blank(&self) -> bool {
        self.name.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.location.is_none()
            && self.description.is_none()
    }

    /// Fill a missing date or time from its counterpart.
    ///
    /// A single pass reaches the fixpoint: each rule only copies into an empty
    /// slot, and after the pass both dates (and both times) are either set or
    /// both empty.
    pub fn inherit_missing(&mut self) {
        if self.start_date.is_none() {
            self.start_date = self.end_date.clone();
        }
        if self.start_time.is_none() {
            self.start_time = self.end_time.clone();
        }
        if self.end_date.is_none() {
            self.end_date = self.start_date.clone();
        }
        if self.end_time.is_none() {
            self.end_time = self.start_time.clone();
        }
    }

    fn into_validated(self) -> Result<ValidatedEvent, RejectionReason> {
        let dates_ok = [&self.start_date, &self.end_date]
            .iter()
            .all(|d| d.as_deref().map_or(true, |d| date_pattern().is_match(d)));
        if !dates_ok {
            return Err(RejectionReason::InvalidDate {
                start: self.start_date,
                end: self.end_date,
            });
        }

        let times_ok = [&self.start_time, &self.end_time]
            .iter()
            .all(|t| t.as_deref().map_or(true, |t| time_pattern().is_match(t)));
        if !times_ok {
            return Err(RejectionReason::InvalidTime {
                start: self.start_time,
                end: self.end_time,
            });
        }

        let name = self.name.ok_or(RejectionReason::MissingName)?;
        let start_date = self.start_date.ok_or(RejectionReason::MissingDate)?;
        let end_date = self.end_date.unwrap_or_else(|| start_date.clone());

        Ok(ValidatedEvent {
            name,
            start_date,
            end_date,
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location,
            description: self.description,
        })
    }
}

impl From<&ValidatedEvent> for EventFields {
    fn from(event: &ValidatedEvent) -> Self {
        Self {
            name: Some(event.name.clone()),
            start_date: Some(event.start_date.clone()),
            end_date: Some(event.end_date.clone()),
            start_time: event.start_time.clone(),
            end_time: event.end_time.clone(),
            location: event.location.clone(),
            description: event.description.clone(),
        }
    }
}

/// Result of normalizing one tuple
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Valid(ValidatedEvent),
    Rejected(RejectionReason),
    /// Every field absent; model noise rather than a failed event
    Blank,
}

/// Normalize one raw tuple. Pure; never panics on model output.
pub fn normalize(raw: &[Option<String>]) -> Normalized {
    let mut fields = match EventFields::from_raw(raw) {
        Ok(fields) => fields,
        Err(reason) => return Normalized::Rejected(reason),
    };

    if fields.is_blank() {
        return Normalized::Blank;
    }

    fields.inherit_missing();

    match fields.into_validated() {
        Ok(event) => Normalized::Valid(event),
        Err(reason) => Normalized::Rejected(reason),
    }
}

/// One entry of an extraction batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchItem {
    Valid(ValidatedEvent),
    Rejected(RejectionReason),
}

impl BatchItem {
    pub fn as_valid(&self) -> Option<&ValidatedEvent> {
        match self {
            BatchItem::Valid(event) => Some(event),
            BatchItem::Rejected(_) => None,
        }
    }
}

/// Ordered, validated reply; empty means no event was found
pub type ExtractionBatch = Vec<BatchItem>;

/// Normalize every tuple of a reply, dropping blank ones and keeping order
pub fn normalize_batch(raw: &[RawEventTuple]) -> ExtractionBatch {
    raw.iter()
        .filter_map(|tuple| match normalize(tuple) {
            Normalized::Valid(event) => Some(BatchItem::Valid(event)),
            Normalized::Rejected(reason) => Some(BatchItem::Rejected(reason)),
            Normalized::Blank => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn tuple(fields: [&str; 7]) -> RawEventTuple {
        fields.iter().map(|f| Some(f.to_string())).collect()
    }

    #[test]
    fn test_time_only_event_inherits_dates_and_times() {
        let raw = tuple(["Hackathon", "2025-03-10", "None", "14:00", "None", "None", "None"]);

        let event = assert_matches!(normalize(&raw), Normalized::Valid(event) => event);
        assert_eq!(event.name, "Hackathon");
        assert_eq!(event.start_date, "2025-03-10");
        assert_eq!(event.end_date, "2025-03-10");
        assert_eq!(event.start_time.as_deref(), Some("14:00"));
        assert_eq!(event.end_time.as_deref(), Some("14:00"));
        assert_eq!(event.location, None);
        assert_eq!(event.description, None);
    }

    #[test]
    fn test_start_date_inherits_end_date() {
        let raw = tuple(["Deadline", "None", "2025-04-01", "None", "None", "Online", "Submit"]);

        let event = assert_matches!(normalize(&raw), Normalized::Valid(event) => event);
        assert_eq!(event.start_date, "2025-04-01");
        assert_eq!(event.end_date, "2025-04-01");
        assert_eq!(event.start_time, None);
        assert_eq!(event.location.as_deref(), Some("Online"));
    }

    #[test]
    fn test_all_absent_is_blank() {
        let raw = tuple(["None"; 7]);
        assert_eq!(normalize(&raw), Normalized::Blank);

        let batch = normalize_batch(&[raw, tuple(["Talk", "2025-01-01", "None", "None", "None", "None", "None"])]);
        assert_eq!(batch.len(), 1);
        assert_matches!(&batch[0], BatchItem::Valid(e) if e.name == "Talk");
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let raw = tuple(["Fest", "25/40/2024", "None", "10:00", "None", "Hall", "None"]);
        let reason = assert_matches!(normalize(&raw), Normalized::Rejected(r) => r);
        assert_matches!(reason, RejectionReason::InvalidDate { .. });
        assert_eq!(
            reason.to_string(),
            "An error occurred while validating dates. 25/40/2024 & 25/40/2024"
        );
    }

    #[test]
    fn test_invalid_date_wins_over_missing_name() {
        let raw = tuple(["None", "25/40/2024", "None", "None", "None", "None", "None"]);
        assert_matches!(
            normalize(&raw),
            Normalized::Rejected(RejectionReason::InvalidDate { .. })
        );
    }

    #[test]
    fn test_invalid_time_is_rejected() {
        let raw = tuple(["Gig", "2025-05-05", "None", "7 PM", "None", "None", "None"]);
        let reason = assert_matches!(normalize(&raw), Normalized::Rejected(r) => r);
        assert_eq!(
            reason.to_string(),
            "An error occurred while validating time. 7 PM & 7 PM"
        );
    }

    #[test]
    fn test_missing_name_and_date() {
        let no_name = tuple(["None", "2025-05-05", "None", "None", "None", "Hall", "None"]);
        assert_matches!(normalize(&no_name), Normalized::Rejected(RejectionReason::MissingName));

        let no_date = tuple(["Meetup", "None", "None", "18:00", "None", "None", "None"]);
        assert_matches!(normalize(&no_date), Normalized::Rejected(RejectionReason::MissingDate));
        assert_eq!(
            RejectionReason::MissingDate.to_string(),
            "The message does not contain the date of the event."
        );
    }

    #[test]
    fn test_wrong_arity_message() {
        let raw: RawEventTuple = vec![Some("Only name".to_string())];
        let reason = assert_matches!(normalize(&raw), Normalized::Rejected(r) => r);
        assert_eq!(reason.to_string(), "Event doesn't have the complete details! Expected 7 got 1.");
    }

    #[test]
    fn test_blank_strings_and_null_count_as_absent() {
        let raw: RawEventTuple = vec![
            Some("  Standup ".to_string()),
            Some("2025-06-01".to_string()),
            None,
            Some(String::new()),
            None,
            Some("   ".to_string()),
            None,
        ];
        let event = assert_matches!(normalize(&raw), Normalized::Valid(e) => e);
        assert_eq!(event.name, "Standup");
        assert_eq!(event.start_time, None);
        assert_eq!(event.location, None);
    }

    #[test]
    fn test_batch_preserves_order_and_interleaves_rejections() {
        let batch = normalize_batch(&[
            tuple(["A", "2025-01-01", "None", "None", "None", "None", "None"]),
            tuple(["None", "None", "None", "None", "None", "None", "None"]),
            tuple(["B", "bad", "None", "None", "None", "None", "None"]),
            tuple(["C", "2025-01-03", "None", "None", "None", "None", "None"]),
        ]);

        assert_eq!(batch.len(), 3);
        assert_matches!(&batch[0], BatchItem::Valid(e) if e.name == "A");
        assert_matches!(&batch[1], BatchItem::Rejected(RejectionReason::InvalidDate { .. }));
        assert_matches!(&batch[2], BatchItem::Valid(e) if e.name == "C");
    }

    fn field() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some(ABSENT.to_string())),
            Just(Some("2025-03-10".to_string())),
            Just(Some("09:30".to_string())),
            "[a-zA-Z0-9 :/-]{0,12}".prop_map(Some),
        ]
    }

    proptest! {
        #[test]
        fn prop_wrong_arity_never_validates(fields in prop::collection::vec(field(), 0..14)) {
            prop_assume!(fields.len() != TUPLE_ARITY);
            prop_assert!(
                matches!(
                    normalize(&fields),
                    Normalized::Rejected(RejectionReason::Malformed { got }) if got == fields.len()
                ),
                "expected malformed rejection"
            );
        }

        #[test]
        fn prop_inheritance_is_a_fixpoint(fields in prop::collection::vec(field(), TUPLE_ARITY)) {
            let mut once = EventFields::from_raw(&fields).unwrap();
            once.inherit_missing();
            let mut twice = once.clone();
            twice.inherit_missing();
            prop_assert_eq!(&once, &twice);
        }

        #[test]
        fn prop_valid_events_renormalize_unchanged(fields in prop::collection::vec(field(), TUPLE_ARITY)) {
            if let Normalized::Valid(event) = normalize(&fields) {
                let mut again = EventFields::from(&event);
                again.inherit_missing();
                prop_assert_eq!(again.into_validated(), Ok(event));
            }
        }
    }
}
