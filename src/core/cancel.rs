use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Shared between a relayed stream and the body wrapper that hyper drops when
/// the client goes away.
///
/// The relay marks the handle completed once it has written a terminal frame;
/// a cancel after that point is ignored, so only a real disconnect is ever
/// observed as a cancellation.
#[derive(Clone)]
pub struct StreamCancelHandle {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
    completed: Arc<AtomicBool>,
}

impl StreamCancelHandle {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
            completed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark the stream as completed normally (a terminal frame was written).
    pub fn mark_completed(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Signal cancellation. Returns `true` if this call cancelled a stream
    /// that had not completed yet.
    pub fn cancel(&self) -> bool {
        if self.is_completed() {
            return false;
        }
        let already = self.sender.send_replace(true);
        !already
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the handle is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.receiver.clone();
        // The sender lives as long as any handle clone, including `self`.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for StreamCancelHandle {
    fn default() -> Self {
        Self::new()
    }
}
