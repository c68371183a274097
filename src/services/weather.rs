//! Geocoding and weather lookups
//!
//! Nominatim resolves a free-form location to coordinates, Visual Crossing
//! returns the forecast for that place on the event's date (and hour, when the
//! event has a start time). Both are plain request/response calls.

use async_trait::async_trait;
use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::config::WeatherConfig;
use crate::utils::errors::{Result, TimeSkedError};

/// A geocoded place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    pub address: String,
}

/// Forecast for the event's hour or day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub feels_like: f64,
    pub precip_prob: f64,
    pub conditions: String,
    pub place: Place,
}

#[async_trait]
pub trait WeatherLookup: Send + Sync {
    /// Resolve a free-form location, `Ok(None)` when nothing matches
    async fn locate(&self, location: &str) -> Result<Option<Place>>;
    /// `Ok(None)` when the place or the forecast is unknown
    async fn forecast(&self, location: &str, date: &str, time: Option<&str>) -> Result<Option<Forecast>>;
}

fn number_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Num {
        F(f64),
        S(String),
    }
    match Num::deserialize(deserializer)? {
        Num::F(f) => Ok(f),
        Num::S(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    #[serde(deserialize_with = "number_from_string")]
    lat: f64,
    #[serde(deserialize_with = "number_from_string")]
    lon: f64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct Timeline {
    #[serde(default)]
    days: Vec<TimelinePeriod>,
}

#[derive(Debug, Clone, Deserialize)]
struct TimelinePeriod {
    #[serde(default)]
    datetime: String,
    #[serde(default)]
    feelslike: Option<f64>,
    #[serde(default)]
    precipprob: Option<f64>,
    #[serde(default)]
    conditions: Option<String>,
    #[serde(default)]
    hours: Vec<TimelinePeriod>,
}

/// HTTP-backed weather lookups
#[derive(Clone)]
pub struct WeatherService {
    config: WeatherConfig,
    http_client: reqwest::Client,
}

impl WeatherService {
    pub fn new(config: WeatherConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(TimeSkedError::Http)?;

        Ok(Self { config, http_client })
    }

    /// Lowercase the query and apply the configured aliases
    pub fn geocoder_query(&self, location: &str) -> String {
        let mut query = location.to_lowercase();
        for (from, to) in &self.config.location_aliases {
            if query.contains(from.as_str()) {
                query = query.replace(from.as_str(), to);
            }
        }
        query
    }

    async fn geocode(&self, location: &str) -> Result<Option<Place>> {
        let query = self.geocoder_query(location);
        let response = self
            .http_client
            .get(&self.config.geocoder_url)
            .query(&[("q", query.as_str()), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Geocoding request failed");
            return Ok(None);
        }

        let places: Vec<NominatimPlace> = response.json().await?;
        Ok(places.into_iter().next().map(|p| Place {
            latitude: p.lat,
            longitude: p.lon,
            name: p.name,
            address: p.display_name,
        }))
    }

    async fn timeline(&self, place: &Place, date: &str) -> Result<Option<Timeline>> {
        let url = format!(
            "{}/{},{}/{}/{}",
            self.config.forecast_url.trim_end_matches('/'),
            place.latitude,
            place.longitude,
            date,
            date
        );
        let response = self
            .http_client
            .get(url)
            .query(&[
                ("key", self.config.api_key.as_str()),
                ("elements", "datetime,feelslike,precipprob,conditions"),
                ("unitGroup", "metric"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Forecast request failed");
            return Ok(None);
        }

        Ok(Some(response.json().await?))
    }
}

/// Pick the forecast hour matching the start time, or the whole day without one
fn pick_period(timeline: Timeline, time: Option<&str>) -> Option<TimelinePeriod> {
    let day = timeline.days.into_iter().next()?;
    match time {
        Some(time) => {
            let hour = NaiveTime::parse_from_str(time, "%H:%M").ok()?;
            let wanted = hour.format("%H:00:00").to_string();
            day.hours.into_iter().find(|h| h.datetime == wanted)
        }
        None => Some(day),
    }
}

#[async_trait]
impl WeatherLookup for WeatherService {
    async fn locate(&self, location: &str) -> Result<Option<Place>> {
        self.geocode(location).await
    }

    async fn forecast(&self, location: &str, date: &str, time: Option<&str>) -> Result<Option<Forecast>> {
        let Some(place) = self.geocode(location).await? else {
            debug!(location = %location, "Location not found");
            return Ok(None);
        };

        let Some(timeline) = self.timeline(&place, date).await? else {
            return Ok(None);
        };

        Ok(pick_period(timeline, time).and_then(|period| {
            Some(Forecast {
                feels_like: period.feelslike?,
                precip_prob: period.precipprob.unwrap_or(0.0),
                conditions: period.conditions.unwrap_or_default(),
                place,
            })
        }))
    }
}

/// Clothing hint for the forecast
pub fn suggestion(forecast: &Forecast) -> String {
    let mut base = String::from("It looks like the weather for your upcoming event will be ");
    if forecast.feels_like > 33.0 {
        base.push_str("quite warm ☀️ . Opt for light and cool clothing.");
    } else if forecast.feels_like > 25.0 {
        base.push_str("pleasant ✨ . Comfortable clothing is suitable.");
    } else {
        base.push_str("a bit cool ❄️ . It's a good idea to wear warmer clothing.");
    }

    if forecast.precip_prob > 40.0 {
        format!(
            "{} There's a {:.1}% chance of rain ⛈️, so an umbrella is recommended ☔️.",
            base, forecast.precip_prob
        )
    } else if forecast.conditions == "Overcast" {
        format!(
            "{} The sky will be overcast ☁️. An umbrella might be helpful in case of unexpected rain ☂️.",
            base
        )
    } else if forecast.conditions == "Clear" || forecast.conditions == "Partially cloudy" {
        base
    } else {
        format!(
            "{} Adjust your attire accordingly to suit the {} conditions.",
            base,
            forecast.conditions.to_lowercase()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forecast(feels_like: f64, precip_prob: f64, conditions: &str) -> Forecast {
        Forecast {
            feels_like,
            precip_prob,
            conditions: conditions.to_string(),
            place: Place {
                latitude: 9.98,
                longitude: 76.28,
                name: "Ernakulam".to_string(),
                address: "Ernakulam, Kerala, India".to_string(),
            },
        }
    }

    #[test]
    fn test_suggestion_thresholds() {
        let hot = suggestion(&forecast(35.0, 10.0, "Clear"));
        assert!(hot.ends_with("quite warm ☀️ . Opt for light and cool clothing."));

        let rainy = suggestion(&forecast(28.0, 65.0, "Rain"));
        assert!(rainy.contains("pleasant ✨"));
        assert!(rainy.contains("There's a 65.0% chance of rain"));

        let overcast = suggestion(&forecast(20.0, 5.0, "Overcast"));
        assert!(overcast.contains("a bit cool ❄️"));
        assert!(overcast.contains("overcast ☁️"));

        let foggy = suggestion(&forecast(20.0, 5.0, "Fog"));
        assert!(foggy.ends_with("suit the fog conditions."));
    }

    #[test]
    fn test_geocoder_query_applies_aliases() {
        let service = WeatherService::new(WeatherConfig::default()).unwrap();
        assert_eq!(service.geocoder_query("Marine Drive, Kochi"), "marine drive, ernakulam");
        assert_eq!(service.geocoder_query("Pune"), "pune");
    }

    #[test]
    fn test_pick_period_by_hour() {
        let timeline: Timeline = serde_json::from_str(
            r#"{"days":[{"datetime":"2025-03-10","feelslike":30.0,"precipprob":10,"conditions":"Clear",
                "hours":[{"datetime":"14:00:00","feelslike":34.5,"precipprob":0,"conditions":"Clear"}]}]}"#,
        )
        .unwrap();
        let period = pick_period(timeline, Some("14:45")).unwrap();
        assert_eq!(period.feelslike, Some(34.5));
    }
}
