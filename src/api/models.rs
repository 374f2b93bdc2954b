//! Request, response and wire-event models for the chat API.

use crate::core::{AppError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::{IntoParams, ToSchema};

/// Body of `POST /chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"message": "hello"}))]
pub struct ChatRequest {
    /// User message; must contain non-whitespace text
    #[serde(default)]
    pub message: Option<String>,
}

/// Query string of `GET /chat/stream`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StreamQuery {
    /// User message; must contain non-whitespace text
    #[serde(default)]
    pub message: Option<String>,
}

/// Full answer returned by `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"text": "Texto para hacer test del text streaming"}))]
pub struct ChatResponse {
    pub text: String,
}

/// Response body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub provider: String,
    pub model: String,
}

/// Standard error response format.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

/// Error detail in API error responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: u16,
}

/// A validated user message: trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage(String);

impl ChatMessage {
    /// Validate a raw message, rejecting missing and blank input with
    /// [`AppError::BadRequest`] carrying `error`.
    pub fn parse(raw: Option<&str>, error: &str) -> Result<Self> {
        match raw.map(str::trim) {
            Some(message) if !message.is_empty() => Ok(Self(message.to_string())),
            _ => Err(AppError::BadRequest(error.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One server-sent event written to the client.
///
/// A stream is always `Ready`, any number of `Delta`, then exactly one of
/// `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Ready,
    Delta(String),
    Done,
    Error(String),
}

impl StreamEvent {
    /// SSE `event:` name.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Ready => "ready",
            StreamEvent::Delta(_) => "delta",
            StreamEvent::Done => "done",
            StreamEvent::Error(_) => "error",
        }
    }

    /// JSON payload carried in the `data:` line.
    pub fn data(&self) -> Value {
        match self {
            StreamEvent::Ready | StreamEvent::Done => json!({}),
            StreamEvent::Delta(delta) => json!({ "delta": delta }),
            StreamEvent::Error(message) => json!({ "message": message }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error(_))
    }

    /// Encode as `event: <name>\ndata: <json>\n\n`.
    ///
    /// Serialized JSON never contains a raw newline, so the payload always
    /// fits on a single `data:` line.
    pub fn to_frame(&self) -> Bytes {
        Bytes::from(format!("event: {}\ndata: {}\n\n", self.name(), self.data()))
    }
}
