//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{TimeSkedError, Result};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_bot_config(&settings.bot)?;
    validate_database_config(&settings.database)?;
    validate_gemini_config(&settings.gemini)?;
    validate_google_config(&settings.google)?;
    validate_weather_config(&settings.weather)?;
    validate_pipeline_config(&settings.pipeline)?;
    validate_logging_config(&settings.logging)?;

    if let Some(ref redis_config) = settings.redis {
        validate_redis_config(redis_config)?;
    }

    Ok(())
}

fn validate_bot_config(config: &super::BotConfig) -> Result<()> {
    if config.token.is_empty() {
        return Err(TimeSkedError::Config(
            "Bot token is required".to_string()
        ));
    }

    Ok(())
}

fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(TimeSkedError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(TimeSkedError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(TimeSkedError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(TimeSkedError::Config(
            "Redis URL is required when the redis section is present".to_string()
        ));
    }

    Ok(())
}

fn validate_gemini_config(config: &super::GeminiConfig) -> Result<()> {
    if config.api_key.is_empty() {
        return Err(TimeSkedError::Config(
            "Gemini API key is required".to_string()
        ));
    }

    if config.model.is_empty() {
        return Err(TimeSkedError::Config(
            "Gemini model name is required".to_string()
        ));
    }

    for (name, value) in [
        ("extraction_temperature", config.extraction_temperature),
        ("chat_temperature", config.chat_temperature),
    ] {
        if !(0.0..=2.0).contains(&value) {
            return Err(TimeSkedError::Config(
                format!("Gemini {} must be between 0 and 2, got {}", name, value)
            ));
        }
    }

    Ok(())
}

fn validate_google_config(config: &super::GoogleConfig) -> Result<()> {
    if config.client_id.is_empty() || config.client_secret.is_empty() {
        return Err(TimeSkedError::Config(
            "Google OAuth client id and secret are required".to_string()
        ));
    }

    url::Url::parse(&config.redirect_uri).map_err(|e| {
        TimeSkedError::Config(format!("Invalid Google redirect URI: {}", e))
    })?;

    if config.time_zone.is_empty() {
        return Err(TimeSkedError::Config(
            "Calendar time zone is required".to_string()
        ));
    }

    Ok(())
}

fn validate_weather_config(config: &super::WeatherConfig) -> Result<()> {
    if config.api_key.is_empty() {
        return Err(TimeSkedError::Config(
            "Weather API key is required".to_string()
        ));
    }

    Ok(())
}

fn validate_pipeline_config(config: &super::PipelineConfig) -> Result<()> {
    if config.model_attempts == 0 || config.extraction_rounds == 0 {
        return Err(TimeSkedError::Config(
            "Model attempts and extraction rounds must be greater than 0".to_string()
        ));
    }

    if config.upcoming_limit <= 0 || config.events_per_row == 0 {
        return Err(TimeSkedError::Config(
            "Upcoming event limit and buttons per row must be greater than 0".to_string()
        ));
    }

    Ok(())
}

fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(TimeSkedError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(TimeSkedError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}
