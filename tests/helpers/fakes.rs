//! In-memory collaborators

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use TimeSked::database::{RecordCounts, RecordStore};
use TimeSked::models::{
    ChatTurn, Credentials, EventRecord, MessageLogEntry, NewEventRecord, UpsertUserRequest, UserRecord,
    ValidatedEvent,
};
use TimeSked::services::gemini::{GenerativeModel, ModelRequest};
use TimeSked::services::google::{CalendarApi, CreatedEvent};
use TimeSked::services::telegram::{Activity, ChatTransport, OutgoingText};
use TimeSked::services::weather::{Forecast, Place, WeatherLookup};
use TimeSked::state::SessionMode;
use TimeSked::utils::errors::{GoogleError, GoogleResult, ModelError, Result, TimeSkedError};

#[derive(Default)]
pub struct InMemoryStore {
    pub users: Mutex<HashMap<i64, UserRecord>>,
    pub events: Mutex<Vec<EventRecord>>,
    pub messages: Mutex<Vec<MessageLogEntry>>,
}

impl InMemoryStore {
    pub fn put_user(&self, user: UserRecord) {
        self.users.lock().unwrap().insert(user.chat_id, user);
    }

    pub fn user(&self, chat_id: i64) -> Option<UserRecord> {
        self.users.lock().unwrap().get(&chat_id).cloned()
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.events.lock().unwrap().clone()
    }

    fn update_user(&self, chat_id: i64, f: impl FnOnce(&mut UserRecord)) -> Result<()> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(&chat_id)
            .ok_or_else(|| TimeSkedError::NotFound(format!("user {}", chat_id)))?;
        f(user);
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn get_user(&self, chat_id: i64) -> Result<Option<UserRecord>> {
        Ok(self.user(chat_id))
    }

    async fn upsert_user(&self, request: UpsertUserRequest) -> Result<UserRecord> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .entry(request.chat_id)
            .or_insert_with(|| UserRecord::new(request.chat_id));
        user.name = request.name;
        user.username = request.username;
        Ok(user.clone())
    }

    async fn increment_uses(&self, chat_id: i64) -> Result<()> {
        self.update_user(chat_id, |user| user.no_of_uses += 1)
    }

    async fn set_position(&self, chat_id: i64, mode: Option<SessionMode>) -> Result<()> {
        self.update_user(chat_id, |user| user.position = mode.map(|m| m.as_str().to_string()))
    }

    async fn set_chat_history(&self, chat_id: i64, history: Option<Vec<ChatTurn>>) -> Result<()> {
        self.update_user(chat_id, |user| user.chat_history = history.map(Json))
    }

    async fn store_credentials(&self, chat_id: i64, credentials: &Credentials) -> Result<()> {
        let credentials = credentials.clone();
        self.update_user(chat_id, |user| {
            user.access_token = Some(credentials.access_token);
            if credentials.refresh_token.is_some() {
                user.refresh_token = credentials.refresh_token;
            }
            user.token_expiry = credentials.expiry;
        })
    }

    async fn set_calendar(&self, chat_id: i64, calendar_id: &str) -> Result<()> {
        self.update_user(chat_id, |user| user.calendar_id = Some(calendar_id.to_string()))
    }

    async fn clear_calendar_link(&self, chat_id: i64) -> Result<()> {
        self.update_user(chat_id, |user| {
            user.access_token = None;
            user.refresh_token = None;
            user.token_expiry = None;
            user.calendar_id = None;
        })
    }

    async fn insert_event(&self, record: NewEventRecord) -> Result<EventRecord> {
        let record = EventRecord::from_new(Uuid::new_v4(), record);
        self.events.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<EventRecord>> {
        Ok(self.events.lock().unwrap().iter().find(|e| e.id == id).cloned())
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool> {
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|e| e.id != id);
        Ok(events.len() < before)
    }

    async fn events_for_message(&self, chat_id: i64, message_id: i32) -> Result<Vec<EventRecord>> {
        Ok(self
            .events()
            .into_iter()
            .filter(|e| e.chat_id == chat_id && e.message_id == message_id)
            .collect())
    }

    async fn upcoming_events(&self, chat_id: i64, from: NaiveDate, limit: i64) -> Result<Vec<EventRecord>> {
        let from = from.format("%Y-%m-%d").to_string();
        let mut events: Vec<EventRecord> = self
            .events()
            .into_iter()
            .filter(|e| e.chat_id == chat_id && e.start_date >= from)
            .collect();
        events.sort_by(|a, b| a.start_date.cmp(&b.start_date));
        events.truncate(limit as usize);
        Ok(events)
    }

    async fn log_message(&self, entry: MessageLogEntry) -> Result<()> {
        self.messages.lock().unwrap().push(entry);
        Ok(())
    }

    async fn get_logged_message(&self, chat_id: i64, message_id: i32) -> Result<Option<MessageLogEntry>> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.chat_id == chat_id && m.message_id == message_id)
            .cloned())
    }

    async fn counts(&self) -> Result<RecordCounts> {
        Ok(RecordCounts {
            users: self.users.lock().unwrap().len() as i64,
            messages: self.messages.lock().unwrap().len() as i64,
            events: self.events.lock().unwrap().len() as i64,
        })
    }
}

/// Replies handed out in order; runs out into `EmptyResponse`
#[derive(Default)]
pub struct ScriptedModel {
    pub replies: Mutex<VecDeque<std::result::Result<String, ModelError>>>,
    pub requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn push_reply(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
    }

    pub fn push_error(&self, error: ModelError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, request: &ModelRequest) -> std::result::Result<String, ModelError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ModelError::EmptyResponse))
    }
}

#[derive(Default)]
pub struct FakeCalendar {
    /// Zero-based positions within a batch that the calendar rejects
    pub failing_items: Mutex<Vec<usize>>,
    pub fail_batch: Mutex<Option<GoogleError>>,
    pub batches: Mutex<Vec<(String, String, Vec<ValidatedEvent>)>>,
    pub deleted: Mutex<Vec<(String, String)>>,
    pub refreshed_with: Mutex<Vec<String>>,
    pub revoked: Mutex<Vec<String>>,
    counter: AtomicI32,
}

impl FakeCalendar {
    pub fn fail_items(&self, positions: &[usize]) {
        *self.failing_items.lock().unwrap() = positions.to_vec();
    }

    pub fn fail_whole_batch(&self, error: GoogleError) {
        *self.fail_batch.lock().unwrap() = Some(error);
    }

    fn next_id(&self) -> String {
        format!("gcal-{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl CalendarApi for FakeCalendar {
    fn authorization_url(&self, state: &str) -> String {
        format!("https://accounts.example.com/auth?state={}", state)
    }

    async fn exchange_code(&self, code: &str) -> GoogleResult<Credentials> {
        if code == "bad" {
            return Err(GoogleError::AuthenticationFailed("invalid_grant".to_string()));
        }
        Ok(Credentials {
            access_token: format!("access-{}", code),
            refresh_token: Some(format!("refresh-{}", code)),
            expiry: Some(Utc::now() + Duration::hours(1)),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> GoogleResult<Credentials> {
        self.refreshed_with.lock().unwrap().push(refresh_token.to_string());
        Ok(Credentials {
            access_token: "fresh-access".to_string(),
            refresh_token: None,
            expiry: Some(Utc::now() + Duration::hours(1)),
        })
    }

    async fn revoke(&self, token: &str) -> GoogleResult<()> {
        self.revoked.lock().unwrap().push(token.to_string());
        Ok(())
    }

    async fn create_calendar(&self, _access_token: &str) -> GoogleResult<String> {
        Ok("timesked-calendar".to_string())
    }

    async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &ValidatedEvent,
    ) -> GoogleResult<CreatedEvent> {
        let mut results = self.insert_events(access_token, calendar_id, std::slice::from_ref(event)).await?;
        results.remove(0)
    }

    async fn insert_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        events: &[ValidatedEvent],
    ) -> GoogleResult<Vec<GoogleResult<CreatedEvent>>> {
        self.batches
            .lock()
            .unwrap()
            .push((access_token.to_string(), calendar_id.to_string(), events.to_vec()));

        if let Some(error) = self.fail_batch.lock().unwrap().clone() {
            return Err(error);
        }

        let failing = self.failing_items.lock().unwrap().clone();
        Ok(events
            .iter()
            .enumerate()
            .map(|(i, _)| {
                if failing.contains(&i) {
                    Err(GoogleError::EventCreationFailed(format!("item {}", i)))
                } else {
                    let id = self.next_id();
                    Ok(CreatedEvent { html_link: format!("https://calendar.example.com/{}", id), id })
                }
            })
            .collect())
    }

    async fn delete_event(&self, _access_token: &str, calendar_id: &str, event_id: &str) -> GoogleResult<()> {
        self.deleted
            .lock()
            .unwrap()
            .push((calendar_id.to_string(), event_id.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { chat_id: i64, message_id: i32, message: OutgoingText },
    Edit { chat_id: i64, message_id: i32, message: OutgoingText },
    Venue { chat_id: i64, place: Place },
    Pin { chat_id: i64, message_id: i32 },
    UnpinAll { chat_id: i64 },
}

/// Records everything the bot would have shown
pub struct RecordingTransport {
    pub log: Mutex<Vec<Sent>>,
    pub activities: Mutex<Vec<Activity>>,
    pub photo: Mutex<Option<Vec<u8>>>,
    /// Rich edits are refused, as Telegram does for bad entities
    pub refuse_rich_edits: Mutex<bool>,
    next_id: AtomicI32,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            activities: Mutex::new(Vec::new()),
            photo: Mutex::new(Some(vec![0xFF, 0xD8, 0xFF])),
            refuse_rich_edits: Mutex::new(false),
            next_id: AtomicI32::new(1000),
        }
    }
}

impl RecordingTransport {
    pub fn entries(&self) -> Vec<Sent> {
        self.log.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<OutgoingText> {
        self.entries()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Edits applied to `message_id`, oldest first
    pub fn edits_of(&self, message_id: i32) -> Vec<OutgoingText> {
        self.entries()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Edit { message_id: id, message, .. } if id == message_id => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn last_edit_of(&self, message_id: i32) -> Option<OutgoingText> {
        self.edits_of(message_id).pop()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(&self, chat_id: i64, message: &OutgoingText) -> Result<i32> {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(Sent::Text { chat_id, message_id, message: message.clone() });
        Ok(message_id)
    }

    async fn edit_text(&self, chat_id: i64, message_id: i32, message: &OutgoingText) -> Result<()> {
        if *self.refuse_rich_edits.lock().unwrap() && message.format != TimeSked::services::telegram::TextFormat::Plain {
            return Err(TimeSkedError::InvalidInput("can't parse entities".to_string()));
        }
        self.log.lock().unwrap().push(Sent::Edit { chat_id, message_id, message: message.clone() });
        Ok(())
    }

    async fn delete_message(&self, _chat_id: i64, _message_id: i32) -> Result<()> {
        Ok(())
    }

    async fn send_activity(&self, _chat_id: i64, activity: Activity) -> Result<()> {
        self.activities.lock().unwrap().push(activity);
        Ok(())
    }

    async fn pin_message(&self, chat_id: i64, message_id: i32) -> Result<()> {
        self.log.lock().unwrap().push(Sent::Pin { chat_id, message_id });
        Ok(())
    }

    async fn unpin_all(&self, chat_id: i64) -> Result<()> {
        self.log.lock().unwrap().push(Sent::UnpinAll { chat_id });
        Ok(())
    }

    async fn send_venue(&self, chat_id: i64, place: &Place) -> Result<()> {
        self.log.lock().unwrap().push(Sent::Venue { chat_id, place: place.clone() });
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        self.photo
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TimeSkedError::NotFound(format!("file {}", file_id)))
    }
}

/// Fixed answers for every location
#[derive(Default)]
pub struct StaticWeather {
    pub forecast: Mutex<Option<Forecast>>,
    pub lookups: Mutex<Vec<String>>,
}

impl StaticWeather {
    pub fn set_forecast(&self, forecast: Forecast) {
        *self.forecast.lock().unwrap() = Some(forecast);
    }
}

#[async_trait]
impl WeatherLookup for StaticWeather {
    async fn locate(&self, location: &str) -> Result<Option<Place>> {
        self.lookups.lock().unwrap().push(location.to_string());
        Ok(self.forecast.lock().unwrap().as_ref().map(|f| f.place.clone()))
    }

    async fn forecast(&self, location: &str, _date: &str, _time: Option<&str>) -> Result<Option<Forecast>> {
        self.lookups.lock().unwrap().push(location.to_string());
        Ok(self.forecast.lock().unwrap().clone())
    }
}

pub fn sample_place() -> Place {
    Place {
        latitude: 10.04,
        longitude: 76.32,
        name: "CUSAT".to_string(),
        address: "Kalamassery, Kochi, Kerala, India".to_string(),
    }
}

pub fn sample_forecast() -> Forecast {
    Forecast {
        feels_like: 35.2,
        precip_prob: 10.0,
        conditions: "Clear".to_string(),
        place: sample_place(),
    }
}
