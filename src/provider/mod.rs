//! Generation providers.
//!
//! A provider turns a user message into either a full answer
//! ([`ChatProvider::complete`]) or a lazy sequence of text fragments
//! ([`ChatProvider::stream`]). Two variants exist:
//!
//! - [`MockProvider`]: deterministic synthetic output, no network access
//! - [`OpenAiProvider`]: the OpenAI Responses API
//!
//! The variant is chosen once by [`build_provider`] and shared by all
//! requests as an `Arc<dyn ChatProvider>`.

pub mod mock;
pub mod openai;
pub mod sse;

use crate::core::config::{ConfigError, ProviderConfig};
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

pub use mock::{MockProvider, MOCK_RESPONSE};
pub use openai::OpenAiProvider;

/// Failure reported by a generation provider.
///
/// The `Display` text is what the client sees in an `error` SSE frame.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The HTTP exchange with the upstream failed (connect, timeout, body read)
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// The upstream did not send response headers in time
    #[error("upstream did not respond within {secs}s")]
    Timeout { secs: u64 },

    /// The upstream answered with a non-success status
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The upstream reported an explicit error event
    #[error("{0}")]
    Upstream(String),

    /// The upstream answered with data that could not be interpreted
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

/// A finite, single-use sequence of text fragments.
///
/// Each poll yields the next fragment, `None` at the end of the sequence, or
/// an `Err` describing why the sequence was aborted. Nothing meaningful
/// follows an `Err`.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// A chat-completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short label used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Model identifier requests are sent with.
    fn model(&self) -> &str;

    /// Produce the full answer to `message`.
    async fn complete(&self, message: &str) -> Result<String, ProviderError>;

    /// Produce the answer to `message` as a lazy fragment sequence.
    ///
    /// No upstream work starts until the returned stream is first polled.
    fn stream(&self, message: &str) -> FragmentStream;
}

/// Build the provider selected by `config`.
///
/// Fails when live mode is selected without a credential, so a misconfigured
/// server refuses to start instead of failing every request.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn ChatProvider>, ConfigError> {
    if config.use_mock {
        tracing::info!(
            delay_ms = config.mock_delay_ms,
            "Using mock generation provider"
        );
        return Ok(Arc::new(MockProvider::from_config(config)));
    }

    let provider = OpenAiProvider::from_config(config)?;
    tracing::info!(
        model = %config.model,
        api_base = %config.api_base,
        "Using OpenAI generation provider"
    );
    Ok(Arc::new(provider))
}
