//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from configuration files and environment variables.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    pub bot: BotConfig,
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub gemini: GeminiConfig,
    pub google: GoogleConfig,
    pub weather: WeatherConfig,
    pub web: WebConfig,
    pub pipeline: PipelineConfig,
    pub dashboard: DashboardConfig,
    pub logging: LoggingConfig,
}

/// Telegram bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BotConfig {
    pub token: String,
    /// Public t.me link the OAuth callback redirects back to
    pub bot_link: String,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Redis configuration, used for caching dashboard counters
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: String,
    pub ttl_seconds: u64,
}

/// Gemini generative model configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub extraction_temperature: f32,
    pub chat_temperature: f32,
    pub timeout_seconds: u64,
}

/// Google OAuth and Calendar configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub calendar_name: String,
    pub time_zone: String,
    pub auth_url: String,
    pub token_url: String,
    pub revoke_url: String,
    pub api_base: String,
}

/// Geocoding and weather forecast configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_key: String,
    pub geocoder_url: String,
    pub forecast_url: String,
    pub user_agent: String,
    /// Lowercase location names rewritten before geocoding
    pub location_aliases: HashMap<String, String>,
}

/// HTTP server for the OAuth callback and the dashboard counters
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
}

/// Retry budgets and list sizes for the extraction pipeline
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Model calls per extraction when the reply is an incomplete literal
    pub model_attempts: u32,
    /// Whole extraction rounds before giving up
    pub extraction_rounds: u32,
    pub upcoming_limit: i64,
    pub events_per_row: usize,
}

/// Offsets added to the public usage counters
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub message_offset: i64,
    pub event_offset: i64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: String,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("TIMESKED").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::TimeSkedError> {
        super::validation::validate_settings(self)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            bot_link: "https://t.me/TimeSkedBot".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/timesked".to_string(),
            max_connections: 10,
            min_connections: 1,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            prefix: "timesked:".to_string(),
            ttl_seconds: 300,
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            extraction_temperature: 0.4,
            chat_temperature: 0.5,
            timeout_seconds: 60,
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:8080/oauthcallback".to_string(),
            calendar_name: "TimeSked".to_string(),
            time_zone: "Asia/Kolkata".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            revoke_url: "https://oauth2.googleapis.com/revoke".to_string(),
            api_base: "https://www.googleapis.com".to_string(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        let mut location_aliases = HashMap::new();
        location_aliases.insert("kochi".to_string(), "ernakulam".to_string());

        Self {
            api_key: String::new(),
            geocoder_url: "https://nominatim.openstreetmap.org/search".to_string(),
            forecast_url: "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline"
                .to_string(),
            user_agent: "TimeSked-Bot/1.0".to_string(),
            location_aliases,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_attempts: 2,
            extraction_rounds: 3,
            upcoming_limit: 10,
            events_per_row: 5,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            message_offset: 210,
            event_offset: 154,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: "logs".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_bot_behaviour() {
        let settings = Settings::default();
        assert_eq!(settings.pipeline.model_attempts, 2);
        assert_eq!(settings.pipeline.extraction_rounds, 3);
        assert_eq!(settings.dashboard.message_offset, 210);
        assert_eq!(settings.dashboard.event_offset, 154);
        assert_eq!(settings.google.time_zone, "Asia/Kolkata");
        assert_eq!(
            settings.weather.location_aliases.get("kochi").map(String::as_str),
            Some("ernakulam")
        );
        assert!(settings.redis.is_none());
    }

    #[test]
    #[serial_test::serial]
    fn test_environment_overrides() {
        std::env::set_var("TIMESKED__BOT__TOKEN", "12345:from_env");
        std::env::set_var("TIMESKED__PIPELINE__EXTRACTION_ROUNDS", "5");

        let settings = Settings::new();

        std::env::remove_var("TIMESKED__BOT__TOKEN");
        std::env::remove_var("TIMESKED__PIPELINE__EXTRACTION_ROUNDS");

        let settings = settings.unwrap();
        assert_eq!(settings.bot.token, "12345:from_env");
        assert_eq!(settings.pipeline.extraction_rounds, 5);
        assert_eq!(settings.pipeline.model_attempts, 2);
    }
}
