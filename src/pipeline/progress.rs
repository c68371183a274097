//! Ordered progress-message edits
//!
//! One worker task drains a process-wide queue and applies edits in the order
//! they were enqueued. Pipeline stages enqueue without waiting; the terminal
//! edit waits for a flush marker first so it is always the last visible state.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::services::telegram::{edit_with_fallback, ChatTransport, OutgoingText};
use crate::utils::errors::{Result, TimeSkedError};
use crate::utils::logging::log_pipeline_stage;

/// Text of the first progress message of every trigger
pub const WAITING_TEXT: &str =
    "⏳ Please Wait while TimeSked does its job... \nThis might take upto 10 seconds !⏳";

enum QueueItem {
    Edit {
        chat_id: i64,
        message_id: i32,
        message: OutgoingText,
    },
    Flush(oneshot::Sender<()>),
}

/// Handle to the single-consumer edit queue
#[derive(Clone)]
pub struct ProgressQueue {
    sender: mpsc::UnboundedSender<QueueItem>,
    transport: Arc<dyn ChatTransport>,
}

impl ProgressQueue {
    /// Spawn the worker on the current runtime
    pub fn spawn(transport: Arc<dyn ChatTransport>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<QueueItem>();
        let worker_transport = transport.clone();

        tokio::spawn(async move {
            while let Some(item) = receiver.recv().await {
                match item {
                    QueueItem::Edit { chat_id, message_id, message } => {
                        if let Err(e) =
                            edit_with_fallback(worker_transport.as_ref(), chat_id, message_id, &message).await
                        {
                            warn!(chat_id = chat_id, message_id = message_id, error = %e, "Progress edit failed");
                        }
                    }
                    QueueItem::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Progress queue closed");
        });

        Self { sender, transport }
    }

    pub fn enqueue(&self, chat_id: i64, message_id: i32, message: OutgoingText) -> Result<()> {
        self.sender
            .send(QueueItem::Edit { chat_id, message_id, message })
            .map_err(|_| TimeSkedError::ServiceUnavailable("progress queue closed".to_string()))
    }

    /// Resolves once every edit enqueued before this call has been applied
    pub async fn flush(&self) -> Result<()> {
        let (done, wait) = oneshot::channel();
        self.sender
            .send(QueueItem::Flush(done))
            .map_err(|_| TimeSkedError::ServiceUnavailable("progress queue closed".to_string()))?;
        wait.await
            .map_err(|_| TimeSkedError::ServiceUnavailable("progress queue worker stopped".to_string()))
    }
}

/// The single message narrating one trigger
pub struct ProgressMessage {
    chat_id: i64,
    message_id: i32,
    text: String,
    stages: usize,
    queue: ProgressQueue,
}

impl ProgressMessage {
    /// Wrap a message already showing `text`
    pub fn new(queue: ProgressQueue, chat_id: i64, message_id: i32, text: impl Into<String>) -> Self {
        Self { chat_id, message_id, text: text.into(), stages: 0, queue }
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    pub fn message_id(&self) -> i32 {
        self.message_id
    }

    /// Cumulative text shown so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Append a stage line and queue the edit
    pub fn advance(&mut self, stage: &str) {
        self.text.push_str(if self.stages == 0 { "\n\n" } else { "\n" });
        self.text.push_str(stage);
        self.stages += 1;
        log_pipeline_stage(self.chat_id, self.message_id, stage.trim());

        if let Err(e) = self
            .queue
            .enqueue(self.chat_id, self.message_id, OutgoingText::plain(self.text.clone()))
        {
            warn!(chat_id = self.chat_id, error = %e, "Could not queue progress edit");
        }
    }

    /// Replace the message with its terminal content once queued edits are done
    pub async fn finish(self, terminal: OutgoingText) -> Result<()> {
        if let Err(e) = self.queue.flush().await {
            warn!(chat_id = self.chat_id, error = %e, "Progress queue flush failed");
        }
        log_pipeline_stage(self.chat_id, self.message_id, "finished");
        edit_with_fallback(self.queue.transport.as_ref(), self.chat_id, self.message_id, &terminal).await
    }
}
