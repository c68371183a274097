//! TimeSked Telegram Bot
//!
//! Turns event announcements (text or photos) into calendar entries: a
//! generative model extracts the events, they are validated and normalized,
//! then added to the user's linked Google Calendar or returned as pre-filled
//! calendar links.

#![allow(non_snake_case)]

pub mod config;
pub mod database;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod state;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{Result, TimeSkedError};

// Re-export main components for easy access
pub use database::{DatabaseService, RecordStore};
pub use pipeline::EventPipeline;
pub use services::ServiceFactory;
pub use state::AppContext;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
