//! Services module
//!
//! Clients for the external services the bot talks to

pub mod gemini;
pub mod google;
pub mod redis;
pub mod telegram;
pub mod weather;

pub use gemini::{GeminiClient, GenerativeModel};
pub use google::{CalendarApi, GoogleCalendarService};
pub use redis::RedisService;
pub use telegram::{ChatTransport, TelegramTransport};
pub use weather::{WeatherLookup, WeatherService};

use crate::config::settings::Settings;
use crate::utils::errors::Result;
use teloxide::Bot;
use tracing::warn;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub gemini_client: GeminiClient,
    pub google_service: GoogleCalendarService,
    pub weather_service: WeatherService,
    pub telegram_transport: TelegramTransport,
    pub redis_service: Option<RedisService>,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized
    pub fn new(bot: Bot, settings: &Settings) -> Result<Self> {
        let gemini_client = GeminiClient::new(settings.gemini.clone())?;
        let google_service = GoogleCalendarService::new(settings.google.clone())?;
        let weather_service = WeatherService::new(settings.weather.clone())?;
        let telegram_transport = TelegramTransport::new(bot);
        let redis_service = settings.redis.clone().map(RedisService::new).transpose()?;

        Ok(Self {
            gemini_client,
            google_service,
            weather_service,
            telegram_transport,
            redis_service,
        })
    }

    /// Health check for all services
    pub async fn health_check(&self) -> ServiceHealthStatus {
        let redis_healthy = match &self.redis_service {
            Some(redis) => Some(redis.health_check().await),
            None => None,
        };

        if redis_healthy == Some(false) {
            warn!("Redis is configured but unreachable, dashboard counts will not be cached");
        }

        ServiceHealthStatus { redis_healthy }
    }
}

/// Health status for optional services
#[derive(Debug, Clone)]
pub struct ServiceHealthStatus {
    /// `None` when Redis is not configured
    pub redis_healthy: Option<bool>,
}

impl ServiceHealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.redis_healthy != Some(false)
    }

    /// Get list of unhealthy services
    pub fn get_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.redis_healthy == Some(false) {
            issues.push("Redis connection failed".to_string());
        }
        issues
    }
}
