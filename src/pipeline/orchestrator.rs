//! Session/progress orchestrator
//!
//! Drives one inbound trigger (text, photo or regenerate) through
//! extraction, validation, the optional weather lookup and reconciliation,
//! narrating every stage on a single progress message. Whatever happens,
//! the progress message ends in a terminal text.

use std::sync::Arc;

use chrono::Local;
use tracing::{error, info, warn};

use crate::database::RecordStore;
use crate::models::{LoggedPayload, UserRecord};
use crate::pipeline::extraction::{EventExtractor, ExtractionFailure, ExtractionInput};
use crate::pipeline::progress::{ProgressMessage, ProgressQueue, WAITING_TEXT};
use crate::pipeline::reconcile::{DeliveryPath, Reconciler};
use crate::pipeline::summary::{
    final_keyboard, rejection_text, render_summary, terminal_text, EXHAUSTED_TEXT, GENERIC_ERROR_TEXT,
    NO_EVENTS_TEXT, PHOTO_FAILED_TEXT, REGENERATE_FAILED_PREFIX, RELINK_TEXT, TRANSIENT_FAILURE_TEXT,
};
use crate::pipeline::validation::{BatchItem, ExtractionBatch};
use crate::services::telegram::{edit_with_fallback, send_with_fallback, Activity, ChatTransport, OutgoingText};
use crate::services::weather::{suggestion, Forecast, WeatherLookup};
use crate::utils::errors::{Result, TimeSkedError};
use crate::utils::logging::log_extraction_attempt;

pub const REGENERATE_TEXT: &str =
    "Working on it! Deleting those previous events... This might take a moment. ⏳";

const STAGE_IMAGE_DOWNLOADED: &str = " - Image downloaded successfully ✨";
const STAGE_EXTRACTING: &str = " - Extracting event details 🔍";
const STAGE_EXTRACTED: &str = " - Event detail extraction successful 🎉";
const STAGE_CALENDAR: &str = " - Adding events to your calendar 🗓️";
const STAGE_LINKS: &str = " - Link generation in process 🔗";

/// Telegram delivers photos as JPEG
const PHOTO_MIME_TYPE: &str = "image/jpeg";

/// Previous response under the regenerate apology, added once
fn restored_text(previous_text: &str) -> String {
    if previous_text.to_lowercase().contains("an error occurred") {
        previous_text.to_string()
    } else {
        format!("{}{}", REGENERATE_FAILED_PREFIX, previous_text)
    }
}

#[derive(Clone)]
pub struct EventPipeline {
    store: Arc<dyn RecordStore>,
    extractor: EventExtractor,
    reconciler: Reconciler,
    weather: Arc<dyn WeatherLookup>,
    transport: Arc<dyn ChatTransport>,
    progress: ProgressQueue,
    rounds: u32,
}

impl EventPipeline {
    pub fn new(
        store: Arc<dyn RecordStore>,
        extractor: EventExtractor,
        reconciler: Reconciler,
        weather: Arc<dyn WeatherLookup>,
        transport: Arc<dyn ChatTransport>,
        progress: ProgressQueue,
        rounds: u32,
    ) -> Self {
        Self {
            store,
            extractor,
            reconciler,
            weather,
            transport,
            progress,
            rounds: rounds.max(1),
        }
    }

    /// Answer a freshly received message with a progress message and run the pipeline on it
    pub async fn handle_message(&self, user: &UserRecord, message_id: i32, payload: &LoggedPayload) -> Result<()> {
        let chat_id = user.chat_id;
        self.typing(chat_id);

        let waiting = OutgoingText::plain(WAITING_TEXT).replying_to(message_id);
        let progress_id = send_with_fallback(self.transport.as_ref(), chat_id, &waiting).await?;

        let mut progress = ProgressMessage::new(self.progress.clone(), chat_id, progress_id, WAITING_TEXT);
        let terminal = self.run(user, message_id, payload, &mut progress).await;
        progress.finish(terminal).await
    }

    /// Undo what `received_message_id` committed and extract it again in place of `response_message_id`.
    ///
    /// When the rerun cannot start, `previous_text` is restored under an apology.
    pub async fn regenerate(
        &self,
        chat_id: i64,
        response_message_id: i32,
        received_message_id: i32,
        previous_text: &str,
    ) -> Result<()> {
        edit_with_fallback(
            self.transport.as_ref(),
            chat_id,
            response_message_id,
            &OutgoingText::plain(REGENERATE_TEXT),
        )
        .await?;

        if let Err(e) = self.rerun(chat_id, response_message_id, received_message_id).await {
            error!(chat_id = chat_id, message_id = received_message_id, error = %e, "Regeneration failed");
            let restored = terminal_text(restored_text(previous_text), received_message_id);
            edit_with_fallback(self.transport.as_ref(), chat_id, response_message_id, &restored).await?;
        }
        Ok(())
    }

    async fn rerun(&self, chat_id: i64, response_message_id: i32, received_message_id: i32) -> Result<()> {
        let user = self
            .store
            .get_user(chat_id)
            .await?
            .ok_or_else(|| TimeSkedError::NotFound(format!("user {}", chat_id)))?;

        let report = self.reconciler.undo_message(&user, received_message_id).await;
        info!(
            chat_id = chat_id,
            message_id = received_message_id,
            records = report.records_deleted,
            calendar_events = report.calendar_events_deleted,
            failures = report.failures,
            "Previous events removed"
        );

        let entry = self
            .store
            .get_logged_message(chat_id, received_message_id)
            .await?
            .ok_or_else(|| TimeSkedError::NotFound(format!("message {} of chat {}", received_message_id, chat_id)))?;

        // Credentials may have been refreshed while undoing
        let user = self.store.get_user(chat_id).await?.unwrap_or(user);

        self.typing(chat_id);
        let mut progress = ProgressMessage::new(self.progress.clone(), chat_id, response_message_id, REGENERATE_TEXT);
        let terminal = self.run(&user, received_message_id, &entry.payload(), &mut progress).await;
        progress.finish(terminal).await
    }

    fn typing(&self, chat_id: i64) {
        let transport = self.transport.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.send_activity(chat_id, Activity::Typing).await {
                warn!(chat_id = chat_id, error = %e, "Failed to send typing action");
            }
        });
    }

    /// Every outcome, including errors, becomes the terminal message
    async fn run(
        &self,
        user: &UserRecord,
        message_id: i32,
        payload: &LoggedPayload,
        progress: &mut ProgressMessage,
    ) -> OutgoingText {
        match self.try_run(user, message_id, payload, progress).await {
            Ok(terminal) => terminal,
            Err(e) => {
                error!(chat_id = user.chat_id, message_id = message_id, error = %e, severity = %e.severity(), "Pipeline failed");
                let text = if e.requires_relink() { RELINK_TEXT } else { GENERIC_ERROR_TEXT };
                terminal_text(text, message_id)
            }
        }
    }

    async fn try_run(
        &self,
        user: &UserRecord,
        message_id: i32,
        payload: &LoggedPayload,
        progress: &mut ProgressMessage,
    ) -> Result<OutgoingText> {
        let chat_id = user.chat_id;

        let input = match payload {
            LoggedPayload::Text(text) => ExtractionInput::Text(text.clone()),
            LoggedPayload::Photo { file_id } => match self.transport.download_file(file_id).await {
                Ok(bytes) => {
                    progress.advance(STAGE_IMAGE_DOWNLOADED);
                    ExtractionInput::Image { mime_type: PHOTO_MIME_TYPE.to_string(), bytes }
                }
                Err(e) => {
                    warn!(chat_id = chat_id, file_id = %file_id, error = %e, "Photo download failed");
                    return Ok(terminal_text(PHOTO_FAILED_TEXT, message_id));
                }
            },
        };

        if let Err(e) = self.store.increment_uses(chat_id).await {
            warn!(chat_id = chat_id, error = %e, "Failed to count use");
        }

        let batch = match self.extract(chat_id, &input, progress).await {
            Ok(batch) => batch,
            Err(ExtractionFailure::Transient(_)) => return Ok(terminal_text(TRANSIENT_FAILURE_TEXT, message_id)),
            Err(ExtractionFailure::Refused(_)) => return Ok(terminal_text(GENERIC_ERROR_TEXT, message_id)),
            Err(ExtractionFailure::Malformed(_)) => return Ok(terminal_text(EXHAUSTED_TEXT, message_id)),
        };

        match batch.as_slice() {
            [] => return Ok(terminal_text(NO_EVENTS_TEXT, message_id)),
            [BatchItem::Rejected(reason)] => return Ok(terminal_text(rejection_text(reason), message_id)),
            _ => {}
        }

        let path = DeliveryPath::for_user(user);
        progress.advance(if path.is_calendar() { STAGE_CALENDAR } else { STAGE_LINKS });

        let forecast = self.forecast_for(chat_id, &batch).await;
        let items = self.reconciler.reconcile(user, message_id, &batch).await?;
        if items.is_empty() {
            return Ok(terminal_text(GENERIC_ERROR_TEXT, message_id));
        }

        let advice = forecast.as_ref().map(suggestion);
        let location = match (&forecast, items.as_slice()) {
            (Some(_), [item]) => item.as_committed().and_then(|c| c.event.location.as_deref()),
            _ => None,
        };

        let text = render_summary(&path, &items, advice.as_deref());
        Ok(OutgoingText::markdown(text).with_keyboard(final_keyboard(message_id, location)))
    }

    /// Up to `rounds` extraction rounds; only a refused request ends them early.
    /// The last failure decides the terminal text.
    async fn extract(
        &self,
        chat_id: i64,
        input: &ExtractionInput,
        progress: &mut ProgressMessage,
    ) -> std::result::Result<ExtractionBatch, ExtractionFailure> {
        progress.advance(STAGE_EXTRACTING);
        let today = Local::now().date_naive();
        let mut failure = ExtractionFailure::Malformed("no extraction round ran".to_string());

        for round in 1..=self.rounds {
            match self.extractor.extract(input, today).await {
                Ok(batch) => {
                    log_extraction_attempt(chat_id, round, "ok");
                    progress.advance(STAGE_EXTRACTED);
                    return Ok(batch);
                }
                Err(e) => {
                    log_extraction_attempt(chat_id, round, &e.to_string());
                    let retryable = e.is_retryable();
                    failure = e;
                    if !retryable {
                        break;
                    }
                    if round < self.rounds {
                        progress.advance(&format!("Attempt {} failed ❌. Reattempting, Please Wait... ⌛", round));
                    }
                }
            }
        }

        Err(failure)
    }

    /// Forecast for a lone valid event with a location; lookup failures only cost the suggestion
    async fn forecast_for(&self, chat_id: i64, batch: &[BatchItem]) -> Option<Forecast> {
        let [BatchItem::Valid(event)] = batch else {
            return None;
        };
        let location = event.location.as_deref()?;

        match self
            .weather
            .forecast(location, &event.start_date, event.start_time.as_deref())
            .await
        {
            Ok(forecast) => forecast,
            Err(e) => {
                warn!(chat_id = chat_id, location = %location, error = %e, "Weather lookup failed");
                None
            }
        }
    }
}
