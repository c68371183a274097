//! Calendar reconciler
//!
//! Commits a validated batch either as pre-filled links or as events on the
//! user's linked calendar, records what was committed, and undoes a previous
//! commit when a message is regenerated.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::database::RecordStore;
use crate::models::{Credentials, NewEventRecord, UserRecord, ValidatedEvent};
use crate::pipeline::link::to_calendar_link;
use crate::pipeline::validation::{BatchItem, RejectionReason};
use crate::services::google::CalendarApi;
use crate::utils::errors::{GoogleError, Result, TimeSkedError};
use crate::utils::logging::log_calendar_operation;

/// How the events of one batch reach the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryPath {
    Link,
    Calendar { calendar_id: String },
}

impl DeliveryPath {
    /// Chosen once per batch from the user's linked calendar
    pub fn for_user(user: &UserRecord) -> Self {
        match &user.calendar_id {
            Some(calendar_id) => DeliveryPath::Calendar { calendar_id: calendar_id.clone() },
            None => DeliveryPath::Link,
        }
    }

    pub fn is_calendar(&self) -> bool {
        matches!(self, DeliveryPath::Calendar { .. })
    }
}

/// An event delivered to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedEvent {
    pub event: ValidatedEvent,
    pub link: String,
    pub external_event_id: Option<String>,
    /// `None` when the record could not be stored
    pub record_id: Option<Uuid>,
}

/// One line of the final summary, in batch order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryItem {
    Committed(CommittedEvent),
    Rejected(RejectionReason),
}

impl SummaryItem {
    pub fn as_committed(&self) -> Option<&CommittedEvent> {
        match self {
            SummaryItem::Committed(committed) => Some(committed),
            SummaryItem::Rejected(_) => None,
        }
    }
}

/// What a compensating delete managed to remove
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UndoReport {
    pub records_deleted: usize,
    pub calendar_events_deleted: usize,
    pub failures: usize,
}

#[derive(Debug, Clone)]
struct Delivery {
    event: ValidatedEvent,
    link: String,
    external_event_id: Option<String>,
}

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    calendar: Arc<dyn CalendarApi>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RecordStore>, calendar: Arc<dyn CalendarApi>) -> Self {
        Self { store, calendar }
    }

    /// Current credentials, refreshed and persisted first when expired
    pub async fn valid_credentials(&self, user: &UserRecord) -> Result<Credentials> {
        let credentials = user.credentials().ok_or(GoogleError::NotLinked)?;
        if !credentials.is_expired(Utc::now()) {
            return Ok(credentials);
        }

        let Some(refresh_token) = credentials.refresh_token.as_deref() else {
            warn!(chat_id = user.chat_id, "Access token expired without a refresh token");
            return Ok(credentials);
        };

        let refreshed = self.calendar.refresh(refresh_token).await?;
        self.store.store_credentials(user.chat_id, &refreshed).await?;
        info!(chat_id = user.chat_id, "Access token refreshed");
        Ok(refreshed)
    }

    /// Commit every valid event of `batch`; rejected items pass through untouched
    pub async fn reconcile(
        &self,
        user: &UserRecord,
        message_id: i32,
        batch: &[BatchItem],
    ) -> Result<Vec<SummaryItem>> {
        match DeliveryPath::for_user(user) {
            DeliveryPath::Link => Ok(self.commit_links(user.chat_id, message_id, batch).await),
            DeliveryPath::Calendar { calendar_id } => {
                self.commit_to_calendar(user, &calendar_id, message_id, batch).await
            }
        }
    }

    async fn commit_links(&self, chat_id: i64, message_id: i32, batch: &[BatchItem]) -> Vec<SummaryItem> {
        let deliveries: Vec<Option<Delivery>> = batch
            .iter()
            .filter_map(BatchItem::as_valid)
            .map(|event| {
                Some(Delivery {
                    event: event.clone(),
                    link: to_calendar_link(event),
                    external_event_id: None,
                })
            })
            .collect();

        log_calendar_operation(chat_id, "link", deliveries.len(), true);
        self.record(chat_id, message_id, batch, deliveries).await
    }

    async fn commit_to_calendar(
        &self,
        user: &UserRecord,
        calendar_id: &str,
        message_id: i32,
        batch: &[BatchItem],
    ) -> Result<Vec<SummaryItem>> {
        let events: Vec<ValidatedEvent> = batch.iter().filter_map(BatchItem::as_valid).cloned().collect();
        if events.is_empty() {
            return Ok(self.record(user.chat_id, message_id, batch, Vec::new()).await);
        }

        let credentials = self.valid_credentials(user).await?;
        let results = self
            .calendar
            .insert_events(&credentials.access_token, calendar_id, &events)
            .await
            .map_err(|e| {
                log_calendar_operation(user.chat_id, "batch_insert", events.len(), false);
                TimeSkedError::Google(e)
            })?;

        let mut results = results.into_iter();
        let deliveries: Vec<Option<Delivery>> = events
            .into_iter()
            .map(|event| match results.next() {
                Some(Ok(created)) => Some(Delivery {
                    event,
                    link: created.html_link,
                    external_event_id: Some(created.id),
                }),
                Some(Err(e)) => {
                    error!(chat_id = user.chat_id, event = %event.name, error = %e, "Calendar rejected event");
                    None
                }
                None => {
                    error!(chat_id = user.chat_id, event = %event.name, "No batch result for event");
                    None
                }
            })
            .collect();

        let accepted = deliveries.iter().flatten().count();
        log_calendar_operation(user.chat_id, "batch_insert", accepted, true);
        Ok(self.record(user.chat_id, message_id, batch, deliveries).await)
    }

    /// Store the delivered events and lay out the summary in batch order.
    ///
    /// `deliveries` has one slot per valid item; `None` slots are left out.
    async fn record(
        &self,
        chat_id: i64,
        message_id: i32,
        batch: &[BatchItem],
        deliveries: Vec<Option<Delivery>>,
    ) -> Vec<SummaryItem> {
        let writes = deliveries.iter().flatten().cloned().map(|delivery| {
            let store = self.store.clone();
            async move {
                let name = delivery.event.name.clone();
                let record = NewEventRecord {
                    chat_id,
                    message_id,
                    event: delivery.event,
                    link: delivery.link,
                    external_event_id: delivery.external_event_id,
                };
                match store.insert_event(record).await {
                    Ok(record) => Some(record.id),
                    Err(e) => {
                        error!(chat_id = chat_id, event = %name, error = %e, "Failed to store event record");
                        None
                    }
                }
            }
        });
        let mut record_ids = join_all(writes).await.into_iter();

        let mut deliveries = deliveries.into_iter();
        batch
            .iter()
            .filter_map(|item| match item {
                BatchItem::Valid(_) => deliveries.next().flatten().map(|delivery| {
                    SummaryItem::Committed(CommittedEvent {
                        event: delivery.event,
                        link: delivery.link,
                        external_event_id: delivery.external_event_id,
                        record_id: record_ids.next().flatten(),
                    })
                }),
                BatchItem::Rejected(reason) => Some(SummaryItem::Rejected(reason.clone())),
            })
            .collect()
    }

    /// Remove every record committed for `message_id`, and its calendar event when it has one.
    ///
    /// Best effort: failures are counted and logged.
    pub async fn undo_message(&self, user: &UserRecord, message_id: i32) -> UndoReport {
        let mut report = UndoReport::default();

        let records = match self.store.events_for_message(user.chat_id, message_id).await {
            Ok(records) => records,
            Err(e) => {
                error!(chat_id = user.chat_id, message_id = message_id, error = %e, "Could not list committed events");
                report.failures += 1;
                return report;
            }
        };

        let mut external_ids = Vec::new();
        for record in records {
            match self.store.delete_event(record.id).await {
                Ok(_) => report.records_deleted += 1,
                Err(e) => {
                    warn!(record_id = %record.id, error = %e, "Could not delete event record");
                    report.failures += 1;
                }
            }
            if let Some(external_id) = record.external_event_id {
                external_ids.push(external_id);
            }
        }

        if external_ids.is_empty() {
            return report;
        }

        let Some(calendar_id) = user.calendar_id.as_deref() else {
            warn!(chat_id = user.chat_id, "Calendar events left behind after unlinking");
            report.failures += external_ids.len();
            return report;
        };

        let credentials = match self.valid_credentials(user).await {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(chat_id = user.chat_id, error = %e, "No credentials to delete calendar events");
                report.failures += external_ids.len();
                return report;
            }
        };

        for external_id in external_ids {
            match self
                .calendar
                .delete_event(&credentials.access_token, calendar_id, &external_id)
                .await
            {
                Ok(()) => report.calendar_events_deleted += 1,
                Err(e) => {
                    warn!(event_id = %external_id, error = %e, "Could not delete calendar event");
                    report.failures += 1;
                }
            }
        }

        log_calendar_operation(user.chat_id, "undo", report.calendar_events_deleted, report.failures == 0);
        report
    }
}
