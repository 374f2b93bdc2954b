//! API layer for the chat stream server.
//!
//! This module contains the HTTP handlers, request/response models, the SSE
//! relay and the router wiring them together.

pub mod disconnect;
pub mod handlers;
pub mod models;
pub mod streaming;

use crate::core::middleware::{request_id_middleware, MetricsMiddleware};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;

// Re-export commonly used types
pub use handlers::{chat_once, chat_stream, health, metrics_handler, AppState};
pub use models::{ChatMessage, ChatRequest, ChatResponse, StreamEvent, StreamQuery};
pub use streaming::{relay_events, relay_response};

/// OpenAPI documentation for the chat API.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::chat_once,
        crate::api::handlers::chat_stream,
        crate::api::handlers::health,
    ),
    components(
        schemas(
            crate::api::models::ChatRequest,
            crate::api::models::ChatResponse,
            crate::api::models::HealthResponse,
            crate::api::models::ApiErrorResponse,
            crate::api::models::ApiErrorDetail,
        )
    ),
    tags(
        (name = "chat", description = "Single-shot and streamed chat completion"),
        (name = "health", description = "Service health")
    ),
    info(
        title = "Chat Stream API",
        description = "Chat completion over HTTP, single-shot or as server-sent events"
    )
)]
pub struct ApiDoc;

/// Build the application router with request-id and metrics middleware.
///
/// Documentation, CORS and trace layers are added by the binary.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(chat_once))
        .route("/chat/stream", get(chat_stream))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(axum::middleware::from_fn(MetricsMiddleware::track_metrics))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}
