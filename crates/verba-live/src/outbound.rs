use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::protocol::AudioEnvelope;

/// What happened to a pushed envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// The queue was full; the oldest envelope was discarded to make room.
    DroppedOldest,
    /// The session is closing; the envelope was discarded.
    Closed,
}

/// Bounded queue between the capture side and the session writer task.
///
/// Capture is fire-and-forget, so a stalled transport must not back up into
/// the audio path; when the queue is full the OLDEST block is dropped —
/// stale microphone audio is worth less than fresh audio, and the peer's
/// turn detection cares about what the user is saying now.
pub struct OutboundQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

struct QueueInner {
    items: VecDeque<AudioEnvelope>,
    closed: bool,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "outbound queue capacity must be non-zero");
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn push(&self, envelope: AudioEnvelope) -> PushOutcome {
        let outcome = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return PushOutcome::Closed;
            }
            let outcome = if inner.items.len() == self.capacity {
                inner.items.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
                PushOutcome::DroppedOldest
            } else {
                PushOutcome::Queued
            };
            inner.items.push_back(envelope);
            outcome
        };

        if outcome == PushOutcome::DroppedOldest {
            tracing::warn!("Outbound queue full; dropped oldest capture block");
        }
        self.notify.notify_one();
        outcome
    }

    /// Wait for the next envelope; `None` once the queue is closed and empty.
    pub async fn pop(&self) -> Option<AudioEnvelope> {
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock();
                if let Some(item) = inner.items.pop_front() {
                    return Some(item);
                }
                if inner.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Stop accepting pushes; pending items remain poppable, then `None`.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
