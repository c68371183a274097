//! Database module
//!
//! PostgreSQL persistence for user records, event records and the message log

pub mod connection;
pub mod repositories;
pub mod service;
pub mod store;

// Re-export commonly used database components
pub use connection::{create_pool, ping, run_migrations, DatabasePool, PoolConfig};
pub use repositories::{UserRepository, EventRepository, MessageRepository};
pub use service::DatabaseService;
pub use store::{RecordStore, RecordCounts};
