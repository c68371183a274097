//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod user;
pub mod event;
pub mod message;
pub mod chat;
pub mod callback;

// Re-export commonly used models
pub use user::{UserRecord, UpsertUserRequest, Credentials};
pub use event::{ValidatedEvent, EventRecord, NewEventRecord};
pub use message::{MessageLogEntry, LoggedPayload};
pub use chat::{ChatTurn, ChatRole};
pub use callback::CallbackAction;
