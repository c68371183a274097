//! Gemini generative model client
//!
//! Thin REST client over `models/{model}:generateContent`. Retry policy lives in
//! the extraction pipeline; this client makes exactly one call per request.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::GeminiConfig;
use crate::models::ChatTurn;
use crate::utils::errors::{ModelError, Result, TimeSkedError};
use crate::utils::logging::log_api_error;

/// One piece of user content
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    Image { mime_type: String, bytes: Vec<u8> },
}

/// Everything the model needs for one call
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub system_instruction: String,
    pub temperature: f32,
    /// Ask for `application/json` output
    pub json_response: bool,
    /// Earlier turns, oldest first
    pub history: Vec<ChatTurn>,
    pub parts: Vec<Part>,
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, request: &ModelRequest) -> std::result::Result<String, ModelError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize, Serialize)]
struct ApiErrorDetail {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// REST client for the Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    http_client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .user_agent("TimeSked-Bot/1.0")
            .build()
            .map_err(TimeSkedError::Http)?;

        Ok(Self { config, http_client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Build the JSON body for a request
    pub fn request_body(request: &ModelRequest) -> Value {
        let mut contents: Vec<Value> = request
            .history
            .iter()
            .map(|turn| json!({ "role": turn.role.as_str(), "parts": [{ "text": turn.content }] }))
            .collect();

        let parts: Vec<Value> = request
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => json!({ "text": text }),
                Part::Image { mime_type, bytes } => json!({
                    "inlineData": {
                        "mimeType": mime_type,
                        "data": base64::engine::general_purpose::STANDARD.encode(bytes),
                    }
                }),
            })
            .collect();
        contents.push(json!({ "role": "user", "parts": parts }));

        let mut generation_config = json!({ "temperature": request.temperature });
        if request.json_response {
            generation_config["responseMimeType"] = json!("application/json");
        }

        json!({
            "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
            "contents": contents,
            "generationConfig": generation_config,
        })
    }

    fn classify_error(status: reqwest::StatusCode, body: &str) -> ModelError {
        let detail = serde_json::from_str::<ApiErrorBody>(body).ok().map(|b| b.error);
        let message = detail
            .as_ref()
            .map(|d| format!("{} {}: {}", d.code, d.status, d.message))
            .unwrap_or_else(|| format!("HTTP {}: {}", status, body));

        let internal = status.is_server_error()
            || detail.as_ref().map_or(false, |d| d.status == "INTERNAL")
            || body.to_lowercase().contains("internal error");

        if internal {
            ModelError::InternalError(message)
        } else {
            ModelError::Request(message)
        }
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, request: &ModelRequest) -> std::result::Result<String, ModelError> {
        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&Self::request_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ModelError::InternalError(e.to_string())
                } else {
                    ModelError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        if !status.is_success() {
            let error = Self::classify_error(status, &body);
            log_api_error("gemini", &error.to_string(), Some(&self.config.model));
            return Err(error);
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::Request(format!("Unreadable response: {}", e)))?;

        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ModelError::Blocked(reason));
        }

        let candidate = parsed.candidates.into_iter().next().ok_or(ModelError::EmptyResponse)?;
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return match candidate.finish_reason.as_deref() {
                Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") => {
                    Err(ModelError::Blocked(candidate.finish_reason.unwrap_or_default()))
                }
                _ => Err(ModelError::EmptyResponse),
            };
        }

        debug!(chars = text.len(), "Gemini response received");
        Ok(text)
    }
}
