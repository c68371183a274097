//! Application context
//!
//! Every handler receives one [`AppContext`]. It owns the process-scoped
//! collaborators behind traits so tests can swap in fakes.

use std::sync::Arc;

use crate::config::Settings;
use crate::database::RecordStore;
use crate::pipeline::{EventExtractor, EventPipeline, ProgressQueue, Reconciler};
use crate::services::{
    CalendarApi, ChatTransport, GenerativeModel, RedisService, ServiceFactory, WeatherLookup,
};

/// Application-wide context containing services and settings
#[derive(Clone)]
pub struct AppContext {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn RecordStore>,
    pub model: Arc<dyn GenerativeModel>,
    pub calendar: Arc<dyn CalendarApi>,
    pub weather: Arc<dyn WeatherLookup>,
    pub transport: Arc<dyn ChatTransport>,
    pub redis: Option<Arc<RedisService>>,
    pub progress: ProgressQueue,
    pub reconciler: Reconciler,
    pub pipeline: EventPipeline,
}

impl AppContext {
    /// Wire the context; spawns the progress queue worker on the current runtime
    pub fn new(
        settings: Settings,
        store: Arc<dyn RecordStore>,
        model: Arc<dyn GenerativeModel>,
        calendar: Arc<dyn CalendarApi>,
        weather: Arc<dyn WeatherLookup>,
        transport: Arc<dyn ChatTransport>,
        redis: Option<Arc<RedisService>>,
    ) -> Self {
        let progress = ProgressQueue::spawn(transport.clone());
        let reconciler = Reconciler::new(store.clone(), calendar.clone());
        let extractor = EventExtractor::new(
            model.clone(),
            settings.pipeline.model_attempts,
            settings.gemini.extraction_temperature,
        );
        let pipeline = EventPipeline::new(
            store.clone(),
            extractor,
            reconciler.clone(),
            weather.clone(),
            transport.clone(),
            progress.clone(),
            settings.pipeline.extraction_rounds,
        );

        Self {
            settings: Arc::new(settings),
            store,
            model,
            calendar,
            weather,
            transport,
            redis,
            progress,
            reconciler,
            pipeline,
        }
    }

    /// Create from ServiceFactory and a record store
    pub fn from_factory(factory: ServiceFactory, store: Arc<dyn RecordStore>, settings: Settings) -> Self {
        Self::new(
            settings,
            store,
            Arc::new(factory.gemini_client),
            Arc::new(factory.google_service),
            Arc::new(factory.weather_service),
            Arc::new(factory.telegram_transport),
            factory.redis_service.map(Arc::new),
        )
    }
}
