//! Event pipeline
//!
//! Extraction, validation, link synthesis, reconciliation and the
//! orchestration that narrates them on a progress message.

pub mod extraction;
pub mod link;
pub mod orchestrator;
pub mod progress;
pub mod prompts;
pub mod reconcile;
pub mod summary;
pub mod validation;

pub use extraction::{EventExtractor, ExtractionFailure, ExtractionInput};
pub use orchestrator::EventPipeline;
pub use progress::{ProgressMessage, ProgressQueue};
pub use reconcile::{CommittedEvent, DeliveryPath, Reconciler, SummaryItem, UndoReport};
pub use validation::{BatchItem, ExtractionBatch, RejectionReason};
