use crate::core::cancel::StreamCancelHandle;
use crate::core::metrics::get_metrics;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A response body wrapper that cancels its stream when dropped early.
///
/// Hyper drops the body when the client disconnects. If that happens before
/// the relay has written its terminal frame, the drop is recorded as a
/// disconnect and the cancel handle is triggered.
pub struct DisconnectStream<S> {
    stream: S,
    cancel_handle: StreamCancelHandle,
    provider: &'static str,
}

impl<S> DisconnectStream<S> {
    pub fn new(stream: S, cancel_handle: StreamCancelHandle, provider: &'static str) -> Self {
        Self {
            stream,
            cancel_handle,
            provider,
        }
    }
}

impl<S> Stream for DisconnectStream<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.stream).poll_next(cx)
    }
}

impl<S> Drop for DisconnectStream<S> {
    fn drop(&mut self) {
        if self.cancel_handle.cancel() {
            tracing::info!(provider = self.provider, "Client disconnected mid-stream");
            get_metrics()
                .stream_outcomes
                .with_label_values(&[self.provider, "disconnect"])
                .inc();
        }
    }
}
