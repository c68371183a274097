//! Google Calendar service implementation
//!
//! OAuth2 (authorization URL, code exchange, refresh, revoke) and the Calendar
//! v3 calls the bot needs: creating its own calendar, inserting events one by
//! one or as a single multipart batch, and deleting events.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::GoogleConfig;
use crate::models::{Credentials, ValidatedEvent};
use crate::pipeline::link::EventSpan;
use crate::utils::errors::{GoogleError, GoogleResult, Result, TimeSkedError};
use crate::utils::logging::log_api_error;

/// Scope limited to calendars the app creates itself
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.app.created";

const BATCH_BOUNDARY: &str = "batch_timesked";

/// An event the calendar accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub id: String,
    #[serde(rename = "htmlLink")]
    pub html_link: String,
}

/// Calendar operations consumed by the reconciler and the link/unlink handlers
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Consent URL; `state` comes back on the OAuth callback
    fn authorization_url(&self, state: &str) -> String;
    async fn exchange_code(&self, code: &str) -> GoogleResult<Credentials>;
    async fn refresh(&self, refresh_token: &str) -> GoogleResult<Credentials>;
    async fn revoke(&self, token: &str) -> GoogleResult<()>;
    async fn create_calendar(&self, access_token: &str) -> GoogleResult<String>;
    async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &ValidatedEvent,
    ) -> GoogleResult<CreatedEvent>;
    /// One batched call; one result per input event, in input order
    async fn insert_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        events: &[ValidatedEvent],
    ) -> GoogleResult<Vec<GoogleResult<CreatedEvent>>>;
    async fn delete_event(&self, access_token: &str, calendar_id: &str, event_id: &str) -> GoogleResult<()>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenResponse {
    fn into_credentials(self) -> Credentials {
        Credentials {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expiry: Some(Utc::now() + Duration::seconds(self.expires_in.unwrap_or(3600))),
        }
    }
}

/// Google Calendar service for event management
#[derive(Clone)]
pub struct GoogleCalendarService {
    config: GoogleConfig,
    http_client: reqwest::Client,
}

fn api_error(e: reqwest::Error) -> GoogleError {
    GoogleError::ApiError(e.to_string())
}

impl GoogleCalendarService {
    /// Create a new GoogleCalendarService instance
    pub fn new(config: GoogleConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("TimeSked-Bot/1.0")
            .build()
            .map_err(TimeSkedError::Http)?;

        Ok(Self { config, http_client })
    }

    fn events_path(calendar_id: &str) -> String {
        format!("/calendar/v3/calendars/{}/events", urlencoding::encode(calendar_id))
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Calendar v3 event resource for a validated event
    pub fn event_body(&self, event: &ValidatedEvent) -> GoogleResult<Value> {
        let span = EventSpan::from_event(event)
            .map_err(|e| GoogleError::EventCreationFailed(e.to_string()))?;

        let (start, end) = match span {
            EventSpan::Timed { start, end } => (
                json!({ "dateTime": start.format("%Y-%m-%dT%H:%M:%S").to_string(), "timeZone": self.config.time_zone }),
                json!({ "dateTime": end.format("%Y-%m-%dT%H:%M:%S").to_string(), "timeZone": self.config.time_zone }),
            ),
            EventSpan::AllDay { start, end } => (
                json!({ "date": start.format("%Y-%m-%d").to_string(), "timeZone": self.config.time_zone }),
                json!({ "date": end.format("%Y-%m-%d").to_string(), "timeZone": self.config.time_zone }),
            ),
        };

        let mut body = json!({ "summary": event.name, "start": start, "end": end });
        if let Some(location) = &event.location {
            body["location"] = json!(location);
        }
        if let Some(description) = &event.description {
            body["description"] = json!(description);
        }
        Ok(body)
    }

    /// multipart/mixed body with one insert per event; Content-IDs are the input indexes
    pub fn batch_body(calendar_id: &str, bodies: &[(usize, Value)]) -> String {
        let mut out = String::new();
        for (index, body) in bodies {
            out.push_str(&format!("--{}\r\n", BATCH_BOUNDARY));
            out.push_str("Content-Type: application/http\r\n");
            out.push_str(&format!("Content-ID: <item-{}>\r\n\r\n", index));
            out.push_str(&format!("POST {} HTTP/1.1\r\n", Self::events_path(calendar_id)));
            out.push_str("Content-Type: application/json\r\n\r\n");
            out.push_str(&body.to_string());
            out.push_str("\r\n");
        }
        out.push_str(&format!("--{}--\r\n", BATCH_BOUNDARY));
        out
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> GoogleResult<TokenResponse> {
        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(params)
            .send()
            .await
            .map_err(api_error)?;

        let status = response.status();
        if status.is_success() {
            return response.json::<TokenResponse>().await.map_err(api_error);
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<OAuthErrorBody>(&body) {
            Ok(err) if err.error == "invalid_grant" => Err(GoogleError::TokenRevoked),
            Ok(err) => Err(GoogleError::AuthenticationFailed(format!(
                "{}: {}",
                err.error,
                err.error_description.unwrap_or_default()
            ))),
            Err(_) => Err(GoogleError::AuthenticationFailed(format!("HTTP {}: {}", status, body))),
        }
    }

    async fn check_status(response: reqwest::Response) -> GoogleResult<reqwest::Response> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GoogleError::TokenRevoked);
        }
        if !status.is_success() {
            let path = response.url().path().to_string();
            let body = response.text().await.unwrap_or_default();
            log_api_error("google_calendar", &format!("HTTP {}", status), Some(&path));
            return Err(GoogleError::ApiError(format!("HTTP {}: {}", status, body)));
        }
        Ok(response)
    }
}

/// Boundary parameter of a multipart content type
pub fn boundary_of(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("boundary="))
        .map(|b| b.trim_matches('"').to_string())
}

fn split_head(text: &str) -> (&str, &str) {
    if let Some(pos) = text.find("\r\n\r\n") {
        (&text[..pos], &text[pos + 4..])
    } else if let Some(pos) = text.find("\n\n") {
        (&text[..pos], &text[pos + 2..])
    } else {
        (text, "")
    }
}

/// Split a batch response into per-item results, in request order.
///
/// Items missing from the response are reported as failures.
pub fn parse_batch_response(
    boundary: &str,
    body: &str,
    expected: &[usize],
) -> GoogleResult<Vec<(usize, GoogleResult<CreatedEvent>)>> {
    let delimiter = format!("--{}", boundary);
    let mut found: Vec<(usize, GoogleResult<CreatedEvent>)> = Vec::new();

    for part in body.split(delimiter.as_str()) {
        let part = part.trim_start_matches("\r\n").trim_start_matches('\n');
        if part.trim().is_empty() || part.starts_with("--") {
            continue;
        }

        let (part_headers, http) = split_head(part);
        let index = part_headers
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if !name.trim().eq_ignore_ascii_case("content-id") {
                    return None;
                }
                let value = value.trim().trim_start_matches('<').trim_end_matches('>');
                value.rsplit('-').next()?.parse::<usize>().ok()
            })
            .ok_or_else(|| GoogleError::BatchParse("part without Content-ID".to_string()))?;

        let (http_head, json_body) = split_head(http);
        let status: u16 = http_head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse().ok())
            .ok_or_else(|| GoogleError::BatchParse(format!("part {} without status line", index)))?;

        let result = if (200..300).contains(&status) {
            serde_json::from_str::<CreatedEvent>(json_body.trim())
                .map_err(|e| GoogleError::BatchParse(e.to_string()))
        } else if status == 401 {
            Err(GoogleError::TokenRevoked)
        } else {
            Err(GoogleError::EventCreationFailed(format!("HTTP {}: {}", status, json_body.trim())))
        };
        found.push((index, result));
    }

    Ok(expected
        .iter()
        .map(|index| {
            let result = found
                .iter()
                .position(|(i, _)| i == index)
                .map(|pos| found[pos].1.clone())
                .unwrap_or_else(|| Err(GoogleError::EventCreationFailed("missing from batch response".to_string())));
            (*index, result)
        })
        .collect())
}

#[async_trait]
impl CalendarApi for GoogleCalendarService {
    fn authorization_url(&self, state: &str) -> String {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", CALENDAR_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("include_granted_scopes", "true"),
            ("state", state),
        ];
        url::Url::parse_with_params(&self.config.auth_url, &params)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| self.config.auth_url.clone())
    }

    async fn exchange_code(&self, code: &str) -> GoogleResult<Credentials> {
        let token = self
            .token_request(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .await?;

        info!("OAuth code exchanged for tokens");
        Ok(token.into_credentials())
    }

    async fn refresh(&self, refresh_token: &str) -> GoogleResult<Credentials> {
        let token = self
            .token_request(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        let mut credentials = token.into_credentials();
        if credentials.refresh_token.is_none() {
            credentials.refresh_token = Some(refresh_token.to_string());
        }
        debug!("Access token refreshed");
        Ok(credentials)
    }

    async fn revoke(&self, token: &str) -> GoogleResult<()> {
        let response = self
            .http_client
            .post(&self.config.revoke_url)
            .query(&[("token", token)])
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send()
            .await
            .map_err(api_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == reqwest::StatusCode::BAD_REQUEST {
            warn!("Token was already invalid when revoking");
            return Ok(());
        }
        Err(GoogleError::ApiError(format!("Revoke failed with HTTP {}", status)))
    }

    async fn create_calendar(&self, access_token: &str) -> GoogleResult<String> {
        let response = self
            .http_client
            .post(self.api_url("/calendar/v3/calendars"))
            .bearer_auth(access_token)
            .json(&json!({ "summary": self.config.calendar_name, "timeZone": self.config.time_zone }))
            .send()
            .await
            .map_err(api_error)?;

        let calendar: Value = Self::check_status(response).await?.json().await.map_err(api_error)?;
        let id = calendar["id"]
            .as_str()
            .ok_or_else(|| GoogleError::ApiError("calendar response without id".to_string()))?;

        info!(calendar_id = %id, "Calendar created");
        Ok(id.to_string())
    }

    async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &ValidatedEvent,
    ) -> GoogleResult<CreatedEvent> {
        let body = self.event_body(event)?;
        let response = self
            .http_client
            .post(self.api_url(&Self::events_path(calendar_id)))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(api_error)?;

        Self::check_status(response).await?.json::<CreatedEvent>().await.map_err(api_error)
    }

    async fn insert_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        events: &[ValidatedEvent],
    ) -> GoogleResult<Vec<GoogleResult<CreatedEvent>>> {
        let mut results: Vec<Option<GoogleResult<CreatedEvent>>> = vec![None; events.len()];
        let mut bodies = Vec::new();
        for (index, event) in events.iter().enumerate() {
            match self.event_body(event) {
                Ok(body) => bodies.push((index, body)),
                Err(e) => results[index] = Some(Err(e)),
            }
        }

        if !bodies.is_empty() {
            let response = self
                .http_client
                .post(self.api_url("/batch/calendar/v3"))
                .bearer_auth(access_token)
                .header(
                    "Content-Type",
                    format!("multipart/mixed; boundary={}", BATCH_BOUNDARY),
                )
                .body(Self::batch_body(calendar_id, &bodies))
                .send()
                .await
                .map_err(api_error)?;

            let response = Self::check_status(response).await?;
            let boundary = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .and_then(boundary_of)
                .ok_or_else(|| GoogleError::BatchParse("response without boundary".to_string()))?;
            let text = response.text().await.map_err(api_error)?;

            let expected: Vec<usize> = bodies.iter().map(|(i, _)| *i).collect();
            for (index, result) in parse_batch_response(&boundary, &text, &expected)? {
                results[index] = Some(result);
            }
        }

        Ok(results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(GoogleError::EventCreationFailed("not submitted".to_string()))))
            .collect())
    }

    async fn delete_event(&self, access_token: &str, calendar_id: &str, event_id: &str) -> GoogleResult<()> {
        let url = self.api_url(&format!(
            "{}/{}",
            Self::events_path(calendar_id),
            urlencoding::encode(event_id)
        ));
        let response = self
            .http_client
            .delete(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(api_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            warn!(event_id = %event_id, "Calendar event already gone");
            return Ok(());
        }
        Self::check_status(response).await?;
        Ok(())
    }
}
