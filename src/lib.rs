//! Chat Stream Server - chat completion over HTTP with SSE streaming
//!
//! This library serves a chat-completion capability in two modes:
//!
//! - **Single shot**: `POST /chat` returns the full answer as JSON
//! - **Streaming**: `GET /chat/stream` relays the answer fragment by fragment
//!   as server-sent events (`ready`, `delta`, `done`, `error`)
//!
//! # Architecture
//!
//! - [`core`]: configuration, errors, logging context, metrics, middleware
//! - [`provider`]: generation providers (mock and OpenAI Responses API)
//! - [`api`]: HTTP handlers, models and the SSE relay
//!
//! # Configuration
//!
//! Read from environment variables (a `.env` file is loaded by the binary):
//! - `USE_MOCK`: serve deterministic synthetic output (default: false)
//! - `OPENAI_MODEL`: model identifier (default: gpt-5)
//! - `OPENAI_API_KEY`: provider credential, required unless `USE_MOCK` is set
//! - `OPENAI_API_BASE`: upstream base URL (default: https://api.openai.com/v1)
//! - `HOST`: Server bind address (default: 0.0.0.0)
//! - `PORT`: Server port (default: 3000)
//! - `REQUEST_TIMEOUT_SECS`: upstream timeout; the streaming body is not bounded (default: 300)
//! - `MOCK_DELAY_MS`: pause between mock fragments (default: 80)

pub mod api;
pub mod core;
pub mod provider;

// Re-export commonly used types for convenience
pub use api::{router, ApiDoc, AppState, ChatRequest, ChatResponse, StreamEvent};
pub use core::{AppConfig, AppError, ConfigError, Result};
pub use provider::{build_provider, ChatProvider, FragmentStream, ProviderError};
