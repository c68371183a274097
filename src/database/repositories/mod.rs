//! Database repositories module

pub mod user;
pub mod event;
pub mod message;

pub use user::UserRepository;
pub use event::EventRepository;
pub use message::MessageRepository;
