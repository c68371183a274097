//! Test context for unified test setup
//!
//! Wires an `AppContext` from in-memory fakes and keeps typed handles on each
//! fake so tests can script and inspect them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use TimeSked::config::Settings;
use TimeSked::models::UserRecord;
use TimeSked::state::AppContext;

use super::fakes::{FakeCalendar, InMemoryStore, RecordingTransport, ScriptedModel, StaticWeather};

pub const CHAT_ID: i64 = 4242;

pub struct TestContext {
    pub ctx: AppContext,
    pub store: Arc<InMemoryStore>,
    pub model: Arc<ScriptedModel>,
    pub calendar: Arc<FakeCalendar>,
    pub weather: Arc<StaticWeather>,
    pub transport: Arc<RecordingTransport>,
}

impl TestContext {
    /// Must run inside a tokio runtime; the progress queue worker is spawned here
    pub fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let store = Arc::new(InMemoryStore::default());
        let model = Arc::new(ScriptedModel::default());
        let calendar = Arc::new(FakeCalendar::default());
        let weather = Arc::new(StaticWeather::default());
        let transport = Arc::new(RecordingTransport::default());

        let ctx = AppContext::new(
            settings,
            store.clone(),
            model.clone(),
            calendar.clone(),
            weather.clone(),
            transport.clone(),
            None,
        );

        Self { ctx, store, model, calendar, weather, transport }
    }

    /// A user on the link path
    pub fn plain_user(&self) -> UserRecord {
        let mut user = UserRecord::new(CHAT_ID);
        user.name = Some("Ada Lovelace".to_string());
        self.store.put_user(user.clone());
        user
    }

    /// A user with a linked calendar and a token valid for another hour
    pub fn linked_user(&self) -> UserRecord {
        let mut user = self.plain_user();
        user.access_token = Some("access".to_string());
        user.refresh_token = Some("refresh".to_string());
        user.token_expiry = Some(Utc::now() + chrono::Duration::hours(1));
        user.calendar_id = Some("timesked-calendar".to_string());
        self.store.put_user(user.clone());
        user
    }

    /// Let fire-and-forget tasks finish
    pub async fn settle(&self) {
        self.ctx.progress.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.bot.token = "12345:test_token".to_string();
    settings.bot.bot_link = "https://t.me/TimeSkedBot".to_string();
    settings
}

/// One event tuple as the model writes it
pub fn tuple(fields: [&str; 7]) -> String {
    let quoted: Vec<String> = fields.iter().map(|f| format!("\"{}\"", f)).collect();
    format!("[{}]", quoted.join(", "))
}

/// A batch reply made of several tuples
pub fn batch(tuples: &[String]) -> String {
    format!("[{}]", tuples.join(", "))
}
