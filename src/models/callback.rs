//! Inline button payloads
//!
//! Callback data travels as `action:param` and is decoded once into
//! [`CallbackAction`] at the handler boundary.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::utils::errors::TimeSkedError;
use crate::utils::helpers::truncate_utf8;

/// Telegram's limit on callback data
pub const MAX_CALLBACK_BYTES: usize = 64;

const REGENERATE: &str = "regenerate";
const LOCATION: &str = "location";
const VIEW_EVENT: &str = "view";
const DELETE_EVENT: &str = "delete";
const BACK_TO_LIST: &str = "back";
const CONFIRM_CHAT: &str = "confirm_chat";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Undo and rerun the extraction of an inbound message
    Regenerate { message_id: i32 },
    /// Send the venue for a free-form location
    Location { query: String },
    /// Show one entry of the upcoming events list
    ViewEvent { index: usize },
    DeleteEvent { record_id: Uuid },
    BackToList,
    ConfirmChat,
}

impl CallbackAction {
    /// Location button for `query`, cut to fit the callback size limit
    pub fn location(query: &str) -> Self {
        let budget = MAX_CALLBACK_BYTES - LOCATION.len() - 1;
        CallbackAction::Location { query: truncate_utf8(query, budget).to_string() }
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::Regenerate { message_id } => write!(f, "{}:{}", REGENERATE, message_id),
            CallbackAction::Location { query } => write!(f, "{}:{}", LOCATION, query),
            CallbackAction::ViewEvent { index } => write!(f, "{}:{}", VIEW_EVENT, index),
            CallbackAction::DeleteEvent { record_id } => write!(f, "{}:{}", DELETE_EVENT, record_id),
            CallbackAction::BackToList => f.write_str(BACK_TO_LIST),
            CallbackAction::ConfirmChat => f.write_str(CONFIRM_CHAT),
        }
    }
}

impl FromStr for CallbackAction {
    type Err = TimeSkedError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let invalid = || TimeSkedError::InvalidInput(format!("Unknown callback data: {}", data));
        let (action, param) = match data.split_once(':') {
            Some((action, param)) => (action, Some(param)),
            None => (data, None),
        };

        match (action, param) {
            (REGENERATE, Some(id)) => id
                .parse()
                .map(|message_id| CallbackAction::Regenerate { message_id })
                .map_err(|_| invalid()),
            (LOCATION, Some(query)) if !query.trim().is_empty() => {
                Ok(CallbackAction::Location { query: query.to_string() })
            }
            (VIEW_EVENT, Some(index)) => index
                .parse()
                .map(|index| CallbackAction::ViewEvent { index })
                .map_err(|_| invalid()),
            (DELETE_EVENT, Some(id)) => Uuid::parse_str(id)
                .map(|record_id| CallbackAction::DeleteEvent { record_id })
                .map_err(|_| invalid()),
            (BACK_TO_LIST, None) => Ok(CallbackAction::BackToList),
            (CONFIRM_CHAT, None) => Ok(CallbackAction::ConfirmChat),
            _ => Err(invalid()),
        }
    }
}
