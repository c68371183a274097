//! Bot handlers module
//!
//! Handlers take an [`AppContext`](crate::state::AppContext) and plain inputs
//! extracted from the Telegram update:
//! - Command handlers for bot commands
//! - Callback handlers for inline keyboard interactions
//! - Message handlers for text and photo messages

pub mod callbacks;
pub mod commands;
pub mod messages;

pub use callbacks::{handle_callback, CallbackInput, CallbackReply};
pub use commands::{handle_command, Command};
pub use messages::{handle_message, InboundMessage};
