//! State management module
//!
//! Per-user conversation modes and the application context

pub mod context;
pub mod session;

pub use context::AppContext;
pub use session::SessionMode;
