//! Test helpers module
//!
//! In-memory fakes of every collaborator trait and a test context that wires
//! them into an `AppContext`.

#![allow(dead_code)]

pub mod fakes;
pub mod test_context;

pub use fakes::*;
pub use test_context::*;
