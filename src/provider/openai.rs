//! OpenAI Responses API provider.
//!
//! Both operations call `POST {api_base}/responses`. Streaming requests set
//! `"stream": true` and read the SSE body incrementally: only
//! `response.output_text.delta` events produce fragments, an `error` event
//! aborts the sequence, every other event type is ignored.

use super::sse::{SseEvent, SseParser};
use super::{ChatProvider, FragmentStream, ProviderError};
use crate::core::config::{ConfigError, ProviderConfig};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const TEXT_DELTA_EVENT: &str = "response.output_text.delta";
const ERROR_EVENT: &str = "error";
const DEFAULT_STREAM_ERROR: &str = "OpenAI stream error";

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: [InputMessage<'a>; 1],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

/// Provider backed by the OpenAI Responses API.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    /// Whole exchange for `complete`, response headers only for `stream`
    request_timeout: Duration,
}

impl OpenAiProvider {
    /// Build the provider, failing if no credential is configured.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    fn url(&self) -> String {
        format!("{}/responses", self.api_base)
    }

    fn request(&self, message: &str, stream: bool) -> reqwest::RequestBuilder {
        let body = ResponsesRequest {
            model: &self.model,
            input: [InputMessage {
                role: "user",
                content: message,
            }],
            stream,
        };

        self.client
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(&body)
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, message: &str) -> Result<String, ProviderError> {
        let request = self.request(message, false).timeout(self.request_timeout);
        let response = check_status(request.send().await?).await?;
        let body = response.bytes().await?;
        let json: Value = serde_json::from_slice(&body)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        Ok(extract_output_text(&json))
    }

    fn stream(&self, message: &str) -> FragmentStream {
        Box::pin(stream_fragments(
            self.request(message, true),
            self.model.clone(),
            self.request_timeout,
        ))
    }
}

/// Send a streaming request and yield text fragments as the body arrives.
///
/// `header_timeout` bounds the wait for the response head. The body itself
/// has no deadline: a healthy stream may run as long as the upstream keeps
/// sending.
fn stream_fragments(
    request: reqwest::RequestBuilder,
    model: String,
    header_timeout: Duration,
) -> impl Stream<Item = Result<String, ProviderError>> + Send {
    async_stream::try_stream! {
        let sent = tokio::time::timeout(header_timeout, request.send())
            .await
            .map_err(|_| ProviderError::Timeout {
                secs: header_timeout.as_secs(),
            })?;
        let response = check_status(sent?).await?;
        tracing::debug!(model = %model, "Upstream stream opened");

        let mut body = response.bytes_stream();
        let mut parser = SseParser::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            let events = parser.parse(&chunk)?;
            for event in events {
                if let Some(fragment) = interpret_event(&event)? {
                    yield fragment;
                }
            }
        }

        if let Some(event) = parser.finish() {
            if let Some(fragment) = interpret_event(&event)? {
                yield fragment;
            }
        }
    }
}

/// Turn a non-success response into [`ProviderError::Status`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|json| {
            json.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(body);

    Err(ProviderError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Map one upstream SSE event to an optional fragment.
///
/// Returns `Err` for an explicit upstream error event.
fn interpret_event(event: &SseEvent) -> Result<Option<String>, ProviderError> {
    let Some(data) = event.data.as_deref() else {
        return Ok(None);
    };
    if data == "[DONE]" {
        return Ok(None);
    }
    let Ok(json) = serde_json::from_str::<Value>(data) else {
        tracing::debug!(data = %data, "Ignoring unparsable upstream event");
        return Ok(None);
    };

    let event_type = json
        .get("type")
        .and_then(Value::as_str)
        .or(event.event.as_deref());

    match event_type {
        Some(TEXT_DELTA_EVENT) => Ok(Some(
            json.get("delta")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        )),
        Some(ERROR_EVENT) => {
            let message = json
                .pointer("/error/message")
                .or_else(|| json.get("message"))
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_STREAM_ERROR);
            Err(ProviderError::Upstream(message.to_string()))
        }
        _ => Ok(None),
    }
}

/// Extract the answer text from a non-streaming Responses API body.
///
/// Prefers the aggregated `output_text` field and falls back to joining every
/// `output_text` content part of the `output` items.
fn extract_output_text(json: &Value) -> String {
    if let Some(text) = json.get("output_text").and_then(Value::as_str) {
        return text.to_string();
    }

    json.get("output")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("content").and_then(Value::as_array))
                .flatten()
                .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}
