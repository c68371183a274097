//! Per-user conversation modes
//!
//! A user is either in normal mode (no position stored) or in exactly one of
//! these modes. While a mode is active, plain messages go to the mode's handler
//! instead of the extraction pipeline.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    /// Free-form conversation with the chat model about upcoming events
    Chatting,
    /// Waiting for the user to type CONFIRM to unlink the calendar
    Deleting,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Chatting => "CHATTING",
            SessionMode::Deleting => "DELETING",
        }
    }

    pub fn parse(position: &str) -> Option<Self> {
        match position {
            "CHATTING" => Some(SessionMode::Chatting),
            "DELETING" => Some(SessionMode::Deleting),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
