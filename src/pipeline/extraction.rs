//! Extraction prompter
//!
//! Sends a message or image to the generative model with the extraction
//! instruction and turns the reply into an [`ExtractionBatch`]. Replies are
//! parsed into a tagged [`ParsedReply`] first; nothing downstream inspects raw
//! JSON shapes.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, warn};

use crate::pipeline::prompts::{extraction_prompt, EXTRACTION_SYSTEM_INSTRUCTION};
use crate::pipeline::validation::{normalize_batch, ExtractionBatch, RawEventTuple};
use crate::services::gemini::{GenerativeModel, ModelRequest, Part};
use crate::utils::errors::ModelError;

/// Content of an inbound trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionInput {
    Text(String),
    Image { mime_type: String, bytes: Vec<u8> },
}

/// Why a reply could not be read as a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The literal stopped early, e.g. an unterminated string
    Incomplete,
    /// Not valid JSON for another reason
    Malformed(String),
    /// Valid JSON that is not a sequence
    WrongShape(String),
}

/// A model reply after parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReply {
    Batch(Vec<RawEventTuple>),
    Empty,
    Error(ParseError),
}

/// Extraction did not produce a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// The model service hiccuped; another round may succeed
    Transient(ModelError),
    /// The model refused the request (bad request, blocked prompt)
    Refused(ModelError),
    /// The model kept answering with something that is not a batch
    Malformed(String),
}

impl ExtractionFailure {
    /// Whether another extraction round may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ExtractionFailure::Refused(_))
    }
}

impl std::fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionFailure::Transient(e) => write!(f, "transient: {}", e),
            ExtractionFailure::Refused(e) => write!(f, "refused: {}", e),
            ExtractionFailure::Malformed(detail) => write!(f, "malformed: {}", detail),
        }
    }
}

impl From<ModelError> for ExtractionFailure {
    fn from(error: ModelError) -> Self {
        if error.is_recoverable() {
            ExtractionFailure::Transient(error)
        } else {
            ExtractionFailure::Refused(error)
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn scalar_field(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn tuple_from(value: &Value) -> RawEventTuple {
    match value {
        Value::Array(fields) => fields.iter().map(scalar_field).collect(),
        // A lone scalar where a tuple was expected; the validator rejects it by arity
        scalar => vec![scalar_field(scalar)],
    }
}

/// Parse the model's text as a sequence of tuples.
///
/// A flat sequence of scalars is a single event whose outer nesting was omitted
/// and is wrapped into a one-element batch.
pub fn parse_reply(text: &str) -> ParsedReply {
    let cleaned = strip_code_fence(text).replace('\n', "");

    let value: Value = match serde_json::from_str(&cleaned) {
        Ok(value) => value,
        Err(e) if e.is_eof() => return ParsedReply::Error(ParseError::Incomplete),
        Err(e) => return ParsedReply::Error(ParseError::Malformed(e.to_string())),
    };

    let Value::Array(items) = value else {
        return ParsedReply::Error(ParseError::WrongShape(cleaned));
    };

    match items.first() {
        None => ParsedReply::Empty,
        Some(Value::Array(_)) => ParsedReply::Batch(items.iter().map(tuple_from).collect()),
        Some(_) => ParsedReply::Batch(vec![items.iter().map(scalar_field).collect()]),
    }
}

/// Drives the model for one extraction, retrying on incomplete literals
#[derive(Clone)]
pub struct EventExtractor {
    model: Arc<dyn GenerativeModel>,
    attempts: u32,
    temperature: f32,
}

impl EventExtractor {
    pub fn new(model: Arc<dyn GenerativeModel>, attempts: u32, temperature: f32) -> Self {
        Self { model, attempts: attempts.max(1), temperature }
    }

    fn request(&self, input: &ExtractionInput, today: NaiveDate) -> ModelRequest {
        let prompt = extraction_prompt(today);
        let parts = match input {
            ExtractionInput::Text(text) => vec![Part::Text(format!("{} {}", prompt, text))],
            ExtractionInput::Image { mime_type, bytes } => vec![
                Part::Image { mime_type: mime_type.clone(), bytes: bytes.clone() },
                Part::Text(prompt),
            ],
        };

        ModelRequest {
            system_instruction: EXTRACTION_SYSTEM_INSTRUCTION.to_string(),
            temperature: self.temperature,
            json_response: true,
            history: Vec::new(),
            parts,
        }
    }

    /// Run one extraction. Only an incomplete literal triggers another model call.
    pub async fn extract(
        &self,
        input: &ExtractionInput,
        today: NaiveDate,
    ) -> Result<ExtractionBatch, ExtractionFailure> {
        let request = self.request(input, today);

        for attempt in 1..=self.attempts {
            let reply = self
                .model
                .generate(&request)
                .await
                .map_err(ExtractionFailure::from)?;
            debug!(attempt = attempt, reply = %reply, "Model reply received");

            match parse_reply(&reply) {
                ParsedReply::Batch(tuples) => return Ok(normalize_batch(&tuples)),
                ParsedReply::Empty => return Ok(Vec::new()),
                ParsedReply::Error(ParseError::Incomplete) => {
                    warn!(attempt = attempt, "Model reply was an incomplete literal");
                }
                ParsedReply::Error(ParseError::Malformed(detail))
                | ParsedReply::Error(ParseError::WrongShape(detail)) => {
                    return Err(ExtractionFailure::Malformed(detail));
                }
            }
        }

        Err(ExtractionFailure::Malformed("reply stayed incomplete".to_string()))
    }
}
