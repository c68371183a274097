//! HTTP clients against mocked Gemini, Google and weather endpoints

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use TimeSked::config::{GeminiConfig, GoogleConfig, WeatherConfig};
use TimeSked::models::ValidatedEvent;
use TimeSked::services::gemini::{GeminiClient, GenerativeModel, ModelRequest, Part};
use TimeSked::services::google::{CalendarApi, GoogleCalendarService};
use TimeSked::services::weather::{WeatherLookup, WeatherService};
use TimeSked::utils::errors::{GoogleError, ModelError};

const GENERATE_PATH: &str = "/models/gemini-test:generateContent";

fn gemini(server: &MockServer) -> GeminiClient {
    GeminiClient::new(GeminiConfig {
        api_key: "gemini-key".to_string(),
        model: "gemini-test".to_string(),
        api_base: server.uri(),
        timeout_seconds: 5,
        ..GeminiConfig::default()
    })
    .unwrap()
}

fn extraction_request() -> ModelRequest {
    ModelRequest {
        system_instruction: "Extract events".to_string(),
        temperature: 0.4,
        json_response: true,
        history: Vec::new(),
        parts: vec![Part::Text("Hackathon tomorrow at 2pm".to_string())],
    }
}

fn google(server: &MockServer) -> GoogleCalendarService {
    GoogleCalendarService::new(GoogleConfig {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        token_url: format!("{}/token", server.uri()),
        revoke_url: format!("{}/revoke", server.uri()),
        api_base: server.uri(),
        ..GoogleConfig::default()
    })
    .unwrap()
}

fn weather(server: &MockServer) -> WeatherService {
    WeatherService::new(WeatherConfig {
        api_key: "weather-key".to_string(),
        geocoder_url: format!("{}/search", server.uri()),
        forecast_url: format!("{}/timeline", server.uri()),
        ..WeatherConfig::default()
    })
    .unwrap()
}

fn event(name: &str) -> ValidatedEvent {
    ValidatedEvent {
        name: name.to_string(),
        start_date: "2030-03-11".to_string(),
        end_date: "2030-03-11".to_string(),
        start_time: Some("14:00".to_string()),
        end_time: None,
        location: Some("CUSAT".to_string()),
        description: None,
    }
}

#[tokio::test]
async fn test_gemini_returns_candidate_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "gemini-key"))
        .and(body_partial_json(json!({
            "generationConfig": { "responseMimeType": "application/json" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "[[\"Hackathon\", " }, { "text": "\"2030-03-11\"]]" }] },
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = gemini(&server).generate(&extraction_request()).await.unwrap();

    assert_eq!(text, "[[\"Hackathon\", \"2030-03-11\"]]");
}

#[tokio::test]
async fn test_gemini_internal_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "code": 500, "message": "An internal error has occurred.", "status": "INTERNAL" }
        })))
        .mount(&server)
        .await;

    let result = gemini(&server).generate(&extraction_request()).await;

    assert_matches!(result, Err(ModelError::InternalError(_)));
}

#[tokio::test]
async fn test_gemini_blocked_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [],
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;

    let result = gemini(&server).generate(&extraction_request()).await;

    assert_matches!(result, Err(ModelError::Blocked(reason)) if reason == "SAFETY");
}

#[tokio::test]
async fn test_gemini_bad_request_is_not_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT" }
        })))
        .mount(&server)
        .await;

    let result = gemini(&server).generate(&extraction_request()).await;

    assert_matches!(result, Err(ModelError::Request(message)) if message.contains("API key not valid"));
}

#[tokio::test]
async fn test_refresh_keeps_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = google(&server).refresh("refresh-1").await.unwrap();

    assert_eq!(credentials.access_token, "access-2");
    assert_eq!(credentials.refresh_token.as_deref(), Some("refresh-1"));
    assert!(credentials.expiry.is_some());
}

#[tokio::test]
async fn test_invalid_grant_means_revoked() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&server)
        .await;

    let result = google(&server).refresh("refresh-1").await;

    assert_matches!(result, Err(GoogleError::TokenRevoked));
}

#[tokio::test]
async fn test_exchange_code_returns_both_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_in": 3599
        })))
        .mount(&server)
        .await;

    let credentials = google(&server).exchange_code("auth-code").await.unwrap();

    assert_eq!(credentials.access_token, "access-1");
    assert_eq!(credentials.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn test_batch_insert_reports_each_item() {
    let server = MockServer::start().await;
    let body = concat!(
        "--batch_resp\r\n",
        "Content-Type: application/http\r\n",
        "Content-ID: <response-item-0>\r\n\r\n",
        "HTTP/1.1 200 OK\r\n",
        "Content-Type: application/json; charset=UTF-8\r\n\r\n",
        "{\"id\": \"evt-1\", \"htmlLink\": \"https://www.google.com/calendar/event?eid=evt-1\"}\r\n",
        "--batch_resp\r\n",
        "Content-Type: application/http\r\n",
        "Content-ID: <response-item-1>\r\n\r\n",
        "HTTP/1.1 400 Bad Request\r\n",
        "Content-Type: application/json; charset=UTF-8\r\n\r\n",
        "{\"error\": {\"code\": 400, \"message\": \"Bad Request\"}}\r\n",
        "--batch_resp--\r\n",
    );
    Mock::given(method("POST"))
        .and(path("/batch/calendar/v3"))
        .and(header("authorization", "Bearer access-1"))
        .and(body_string_contains("Content-ID: <item-1>"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "multipart/mixed; boundary=batch_resp"))
        .expect(1)
        .mount(&server)
        .await;

    let results = google(&server)
        .insert_events("access-1", "calendar-1", &[event("Alpha"), event("Bravo")])
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    let created = results[0].as_ref().unwrap();
    assert_eq!(created.id, "evt-1");
    assert_eq!(created.html_link, "https://www.google.com/calendar/event?eid=evt-1");
    assert_matches!(&results[1], Err(GoogleError::EventCreationFailed(_)));
}

#[tokio::test]
async fn test_batch_insert_with_expired_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/batch/calendar/v3"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = google(&server)
        .insert_events("stale", "calendar-1", &[event("Alpha")])
        .await;

    assert_matches!(result, Err(GoogleError::TokenRevoked));
}

#[tokio::test]
async fn test_create_calendar_and_delete_missing_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/calendar/v3/calendars"))
        .and(body_partial_json(json!({ "summary": "TimeSked", "timeZone": "Asia/Kolkata" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cal-123@group.calendar.google.com" })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/calendar/v3/calendars/cal-1/events/evt-gone"))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&server)
        .await;

    let service = google(&server);
    let calendar_id = service.create_calendar("access-1").await.unwrap();
    assert_eq!(calendar_id, "cal-123@group.calendar.google.com");

    service.delete_event("access-1", "cal-1", "evt-gone").await.unwrap();
}

#[tokio::test]
async fn test_revoke_tolerates_invalid_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/revoke"))
        .and(query_param("token", "refresh-1"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    google(&server).revoke("refresh-1").await.unwrap();
}

#[tokio::test]
async fn test_forecast_for_event_hour() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "cusat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "lat": "10.04",
            "lon": "76.32",
            "name": "CUSAT",
            "display_name": "Cochin University, Kalamassery, Kerala, India"
        }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/timeline/10.04,76.32/2030-03-11/2030-03-11"))
        .and(query_param("key", "weather-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "days": [{
                "datetime": "2030-03-11",
                "feelslike": 31.0,
                "precipprob": 20.0,
                "conditions": "Partially cloudy",
                "hours": [
                    { "datetime": "13:00:00", "feelslike": 35.0, "precipprob": 0.0, "conditions": "Clear" },
                    { "datetime": "14:00:00", "feelslike": 34.5, "precipprob": 55.0, "conditions": "Rain" }
                ]
            }]
        })))
        .mount(&server)
        .await;

    let service = weather(&server);

    let hourly = service.forecast("CUSAT", "2030-03-11", Some("14:30")).await.unwrap().unwrap();
    assert_eq!(hourly.feels_like, 34.5);
    assert_eq!(hourly.precip_prob, 55.0);
    assert_eq!(hourly.conditions, "Rain");
    assert_eq!(hourly.place.name, "CUSAT");

    let daily = service.forecast("CUSAT", "2030-03-11", None).await.unwrap().unwrap();
    assert_eq!(daily.feels_like, 31.0);
}

#[tokio::test]
async fn test_unknown_place() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let service = weather(&server);

    assert_eq!(service.locate("Atlantis").await.unwrap(), None);
    assert_eq!(service.forecast("Atlantis", "2030-03-11", None).await.unwrap(), None);
}
