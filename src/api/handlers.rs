//! HTTP request handlers for the chat API.
//!
//! This module contains the chat endpoints, the health check and the
//! metrics endpoint.

use crate::api::models::*;
use crate::api::streaming::relay_response;
use crate::core::config::{AppConfig, ConfigError};
use crate::core::logging::get_request_id;
use crate::core::metrics::get_metrics;
use crate::core::{AppError, Result};
use crate::provider::{build_provider, ChatProvider};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state.
///
/// Read-only after startup; every request gets its own provider call.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub provider: Arc<dyn ChatProvider>,
}

impl AppState {
    pub fn new(config: AppConfig, provider: Arc<dyn ChatProvider>) -> Self {
        Self { config, provider }
    }

    /// Build the state, constructing the provider selected by `config`.
    pub fn from_config(config: AppConfig) -> std::result::Result<Self, ConfigError> {
        let provider = build_provider(&config.provider)?;
        Ok(Self::new(config, provider))
    }
}

/// Answer a message in one response.
#[utoipa::path(
    post,
    path = "/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Full answer", body = ChatResponse),
        (status = 400, description = "Missing or blank message", body = ApiErrorResponse),
        (status = 502, description = "Provider failure", body = ApiErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(provider = state.provider.name()))]
pub async fn chat_once(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>> {
    let Json(payload) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let message = ChatMessage::parse(payload.message.as_deref(), "message is required")?;

    tracing::debug!(
        request_id = %get_request_id(),
        chars = message.as_str().chars().count(),
        "Processing chat request"
    );

    let start = Instant::now();
    let text = state.provider.complete(message.as_str()).await?;
    get_metrics()
        .provider_latency
        .with_label_values(&[state.provider.name()])
        .observe(start.elapsed().as_secs_f64());

    Ok(Json(ChatResponse { text }))
}

/// Stream the answer to a message as server-sent events.
///
/// Frames: `ready` once, one `delta` per fragment, then exactly one of `done`
/// or `error`.
#[utoipa::path(
    get,
    path = "/chat/stream",
    tag = "chat",
    params(StreamQuery),
    responses(
        (status = 200, description = "SSE stream of ready, delta, done and error events", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Missing or blank message", body = ApiErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(provider = state.provider.name()))]
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<StreamQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let message = ChatMessage::parse(query.message.as_deref(), "message query param is required")?;

    let request_id = get_request_id();
    tracing::debug!(
        request_id = %request_id,
        chars = message.as_str().chars().count(),
        "Opening chat stream"
    );

    let fragments = state.provider.stream(message.as_str());
    Ok(relay_response(fragments, state.provider.name(), request_id))
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        provider: state.provider.name().to_string(),
        model: state.provider.model().to_string(),
    })
}

/// Prometheus metrics endpoint.
pub async fn metrics_handler() -> Result<Response> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let content_type = HeaderValue::from_str(encoder.format_type())
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, content_type)], buffer).into_response())
}
