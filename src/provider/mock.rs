//! Deterministic provider used for demos and tests.

use super::{ChatProvider, FragmentStream, ProviderError};
use crate::core::config::ProviderConfig;
use async_trait::async_trait;
use std::time::Duration;

/// Fixed answer returned for every message.
pub const MOCK_RESPONSE: &str = "Texto para hacer test del text streaming";

/// Provider that answers every message with [`MOCK_RESPONSE`].
///
/// Streaming splits the sentence on single spaces and yields each word with a
/// trailing space, pausing `delay` after every fragment.
#[derive(Debug, Clone)]
pub struct MockProvider {
    model: String,
    delay: Duration,
}

impl MockProvider {
    pub fn new(model: impl Into<String>, delay: Duration) -> Self {
        Self {
            model: model.into(),
            delay,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(
            config.model.clone(),
            Duration::from_millis(config.mock_delay_ms),
        )
    }

    /// The fragments [`ChatProvider::stream`] yields, in order.
    pub fn fragments() -> Vec<String> {
        MOCK_RESPONSE
            .split(' ')
            .map(|word| format!("{} ", word))
            .collect()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, _message: &str) -> Result<String, ProviderError> {
        Ok(MOCK_RESPONSE.to_string())
    }

    fn stream(&self, _message: &str) -> FragmentStream {
        let delay = self.delay;
        let fragments = Self::fragments();
        Box::pin(async_stream::stream! {
            for fragment in fragments {
                yield Ok::<_, ProviderError>(fragment);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        })
    }
}
