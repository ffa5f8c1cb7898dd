//! Bounded FIFO of client frames held until the upstream link opens.

use std::collections::VecDeque;

use parking_lot::Mutex;
use thiserror::Error;

use super::frame::Frame;

/// Default number of frames buffered before the upstream opens.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is full (capacity {capacity})")]
    Full { capacity: usize },

    #[error("queue is closed")]
    Closed,
}

#[derive(Debug)]
struct Inner {
    frames: VecDeque<Frame>,
    closed: bool,
}

/// Thread-safe bounded FIFO.
///
/// Enqueue never blocks: it either succeeds or reports `Full`/`Closed`.
/// The queue is drained exactly once, either by [`take_all`](Self::take_all)
/// when the upstream opens or by [`close_and_drain`](Self::close_and_drain)
/// when the session fails first. Both close the queue.
#[derive(Debug)]
pub struct OutboundQueue {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                frames: VecDeque::with_capacity(capacity.min(DEFAULT_QUEUE_CAPACITY)),
                closed: false,
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().frames.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Append a frame. The frame is handed back on failure so the caller can
    /// account for it.
    pub fn enqueue(&self, frame: Frame) -> Result<usize, (Frame, QueueError)> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err((frame, QueueError::Closed));
        }
        if inner.frames.len() >= self.capacity {
            return Err((
                frame,
                QueueError::Full {
                    capacity: self.capacity,
                },
            ));
        }
        inner.frames.push_back(frame);
        Ok(inner.frames.len())
    }

    /// Take every queued frame in arrival order and close the queue.
    ///
    /// Returns an empty vector if the queue was already drained.
    pub fn take_all(&self) -> Vec<Frame> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.frames.drain(..).collect()
    }

    /// Close the queue and discard whatever it still holds.
    ///
    /// Returns the number of discarded frames.
    pub fn close_and_drain(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.closed = true;
        let discarded = inner.frames.len();
        inner.frames.clear();
        discarded
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
