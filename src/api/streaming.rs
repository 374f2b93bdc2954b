//! Server-Sent Events relay for streamed chat answers.
//!
//! The relay pulls fragments from a provider's [`FragmentStream`] one at a
//! time and writes them to the client as SSE frames:
//!
//! ```text
//! ready -> delta* -> (done | error) -> end of body
//! ```
//!
//! Exactly one terminal frame is written per stream. [`Relay::finish`] is the
//! only place a terminal frame is produced and it is a no-op once the relay
//! has finished, so no frame can follow `done` or `error`.
//!
//! A stream counts as completed only when the body is polled past its
//! terminal frame. A client that goes away before that is recorded as a
//! disconnect, even if the terminal frame was already produced.

use crate::api::disconnect::DisconnectStream;
use crate::api::models::StreamEvent;
use crate::core::cancel::StreamCancelHandle;
use crate::core::metrics::get_metrics;
use crate::provider::{FragmentStream, ProviderError};
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Instant;

/// `Content-Type` of every relayed stream.
pub const SSE_CONTENT_TYPE: &str = "text/event-stream; charset=utf-8";

/// Message used when a failure carries no text of its own.
pub const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// `ready` has not been written yet
    Opening,
    /// Pulling fragments
    Streaming,
    /// A terminal frame was written or the stream was cancelled
    Finished,
}

enum Pull {
    Next(Option<Result<String, ProviderError>>),
    Cancelled,
}

struct Relay {
    fragments: Option<FragmentStream>,
    phase: Phase,
    cancel: StreamCancelHandle,
    provider: &'static str,
    request_id: String,
    started: Instant,
    fragments_sent: usize,
    /// Outcome of a terminal frame not yet confirmed by the next poll
    pending_outcome: Option<&'static str>,
}

impl Relay {
    fn new(
        fragments: FragmentStream,
        cancel: StreamCancelHandle,
        provider: &'static str,
        request_id: String,
    ) -> Self {
        get_metrics()
            .active_streams
            .with_label_values(&[provider])
            .inc();

        Self {
            fragments: Some(fragments),
            phase: Phase::Opening,
            cancel,
            provider,
            request_id,
            started: Instant::now(),
            fragments_sent: 0,
            pending_outcome: None,
        }
    }

    async fn next_event(&mut self) -> Option<StreamEvent> {
        match self.phase {
            Phase::Opening => {
                self.phase = Phase::Streaming;
                tracing::debug!(
                    request_id = %self.request_id,
                    provider = self.provider,
                    "SSE stream opened"
                );
                Some(StreamEvent::Ready)
            }
            Phase::Streaming => self.pull().await,
            Phase::Finished => {
                self.confirm_terminal();
                None
            }
        }
    }

    async fn pull(&mut self) -> Option<StreamEvent> {
        if self.cancel.is_cancelled() {
            return self.stop_cancelled();
        }

        let pulled = match self.fragments.as_mut() {
            Some(fragments) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Pull::Cancelled,
                    next = fragments.next() => Pull::Next(next),
                }
            }
            None => Pull::Next(None),
        };

        match pulled {
            Pull::Next(Some(Ok(fragment))) => {
                if self.fragments_sent == 0 {
                    get_metrics()
                        .time_to_first_fragment
                        .with_label_values(&[self.provider])
                        .observe(self.started.elapsed().as_secs_f64());
                }
                self.fragments_sent += 1;
                Some(StreamEvent::Delta(fragment))
            }
            Pull::Next(Some(Err(e))) => self.finish(StreamEvent::Error(error_message(&e))),
            Pull::Next(None) => self.finish(StreamEvent::Done),
            Pull::Cancelled => self.stop_cancelled(),
        }
    }

    fn stop_cancelled(&mut self) -> Option<StreamEvent> {
        tracing::debug!(
            request_id = %self.request_id,
            provider = self.provider,
            fragments = self.fragments_sent,
            "SSE stream cancelled, no longer pulling fragments"
        );
        self.phase = Phase::Finished;
        self.fragments = None;
        None
    }

    /// Produce the terminal frame. Returns `None` if the relay already finished.
    fn finish(&mut self, event: StreamEvent) -> Option<StreamEvent> {
        debug_assert!(event.is_terminal());
        if self.phase == Phase::Finished {
            return None;
        }
        self.phase = Phase::Finished;
        // Release the upstream before the final frame is flushed.
        self.fragments = None;
        self.pending_outcome = Some(event.name());

        match &event {
            StreamEvent::Error(message) => tracing::warn!(
                request_id = %self.request_id,
                provider = self.provider,
                fragments = self.fragments_sent,
                error = %message,
                "SSE stream ended with error"
            ),
            _ => tracing::info!(
                request_id = %self.request_id,
                provider = self.provider,
                fragments = self.fragments_sent,
                duration_secs = self.started.elapsed().as_secs_f64(),
                "SSE stream completed"
            ),
        }

        Some(event)
    }

    /// The body was polled past the terminal frame: the client took it.
    fn confirm_terminal(&mut self) {
        if let Some(outcome) = self.pending_outcome.take() {
            self.cancel.mark_completed();
            get_metrics()
                .stream_outcomes
                .with_label_values(&[self.provider, outcome])
                .inc();
        }
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        get_metrics()
            .active_streams
            .with_label_values(&[self.provider])
            .dec();
    }
}

fn error_message(error: &ProviderError) -> String {
    let message = error.to_string();
    if message.trim().is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        message
    }
}

/// Drive `fragments` to completion as a sequence of [`StreamEvent`]s.
///
/// The sequence starts with `Ready` before the first fragment is requested
/// and ends right after its single terminal event. If `cancel` fires while
/// waiting for a fragment, the sequence ends without a terminal event and the
/// fragment stream is dropped.
pub fn relay_events(
    fragments: FragmentStream,
    cancel: StreamCancelHandle,
    provider: &'static str,
    request_id: String,
) -> impl Stream<Item = StreamEvent> + Send {
    let relay = Relay::new(fragments, cancel, provider, request_id);

    futures::stream::unfold(relay, |mut relay| async move {
        let event = relay.next_event().await?;
        Some((event, relay))
    })
}

/// Build the SSE response that relays `fragments` to the client.
pub fn relay_response(
    fragments: FragmentStream,
    provider: &'static str,
    request_id: String,
) -> Response {
    let cancel = StreamCancelHandle::new();

    let frames = relay_events(fragments, cancel.clone(), provider, request_id).map(
        move |event| {
            get_metrics()
                .stream_events
                .with_label_values(&[provider, event.name()])
                .inc();
            Ok::<Bytes, Infallible>(event.to_frame())
        },
    );

    let body = Body::from_stream(DisconnectStream::new(Box::pin(frames), cancel, provider));
    sse_response(body)
}

/// Wrap `body` in a `200` response with streaming headers.
pub fn sse_response(body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(SSE_CONTENT_TYPE));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-transform"),
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));

    response
}
