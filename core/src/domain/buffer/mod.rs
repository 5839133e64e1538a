//! Buffering and batching engine
//!
//! Producers enqueue encoded span payloads; a single flush consumer drains
//! them in size- and age-bounded batches. Admission is all-or-nothing per
//! batch: a batch that would push the buffer over its item or byte limit is
//! rejected whole. Counters are decremented at dequeue time, so a crash
//! between dequeue and persistence drops at most one in-flight batch.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::core::constants;

pub mod codec;
pub mod flush;

pub use codec::{decode, encode, CodecError};
pub use flush::FlushWorker;

// ============================================================================
// ITEMS AND LIMITS
// ============================================================================

/// One encoded payload held by the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedItem {
    pub payload: Vec<u8>,
}

impl BufferedItem {
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    pub fn size_bytes(&self) -> usize {
        self.payload.len()
    }
}

/// Admission limits for the whole buffer
#[derive(Debug, Clone, Copy)]
pub struct EnqueueLimits {
    pub max_size: usize,
    pub max_bytes: usize,
}

impl Default for EnqueueLimits {
    fn default() -> Self {
        Self {
            max_size: constants::BUFFER_MAX_ITEMS,
            max_bytes: constants::BUFFER_MAX_BYTES,
        }
    }
}

/// Batch shaping parameters for one dequeue call
#[derive(Debug, Clone, Copy)]
pub struct DequeueParams {
    /// Maximum items per batch
    pub max_size: usize,
    /// Maximum payload bytes per batch
    pub max_bytes: usize,
    /// Longest a dequeue call waits for a first item, and the drain cutoff
    pub max_age: Duration,
    /// Minimum time from call start before the batch is closed, letting
    /// bursts coalesce
    pub min_age: Duration,
}

impl Default for DequeueParams {
    fn default() -> Self {
        Self {
            max_size: constants::FLUSH_BATCH_MAX_ITEMS,
            max_bytes: constants::FLUSH_BATCH_MAX_BYTES,
            max_age: Duration::from_millis(constants::FLUSH_BATCH_MAX_AGE_MS),
            min_age: Duration::from_millis(constants::FLUSH_BATCH_MIN_AGE_MS),
        }
    }
}

// ============================================================================
// BUFFER
// ============================================================================

#[derive(Debug, Default)]
struct BufferState {
    queue: VecDeque<BufferedItem>,
    count: usize,
    bytes: usize,
}

/// In-memory FIFO buffer with bounded admission and batched draining
pub struct SpanBuffer {
    state: Mutex<BufferState>,
    notify: Notify,
    limits: EnqueueLimits,
}

impl SpanBuffer {
    pub fn new(limits: EnqueueLimits) -> Self {
        Self {
            state: Mutex::new(BufferState::default()),
            notify: Notify::new(),
            limits,
        }
    }

    /// Admit a batch of items, all or nothing.
    ///
    /// Returns false without enqueuing anything if the batch would exceed
    /// either buffer limit.
    pub fn enqueue_batch(&self, items: Vec<BufferedItem>) -> bool {
        if items.is_empty() {
            return true;
        }
        let incoming_count = items.len();
        let incoming_bytes: usize = items.iter().map(BufferedItem::size_bytes).sum();

        {
            let mut state = self.state.lock();
            if state.count + incoming_count > self.limits.max_size
                || state.bytes + incoming_bytes > self.limits.max_bytes
            {
                tracing::warn!(
                    buffered = state.count,
                    incoming = incoming_count,
                    buffered_bytes = state.bytes,
                    incoming_bytes,
                    "Buffer full, rejecting batch"
                );
                return false;
            }
            state.count += incoming_count;
            state.bytes += incoming_bytes;
            state.queue.extend(items);
        }

        self.notify.notify_one();
        true
    }

    /// Drain one batch, waiting up to `max_age` for a first item.
    ///
    /// Returns an empty batch on timeout. Once a first item arrives, the
    /// call waits out `min_age` (measured from call start) and then takes
    /// whatever is queued up to the batch limits.
    pub async fn dequeue_batch(&self, params: &DequeueParams) -> Vec<BufferedItem> {
        let started = Instant::now();
        let deadline = started + params.max_age;

        let first = loop {
            if let Some(item) = self.pop_one() {
                break item;
            }
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return Vec::new();
            }
        };

        if let Some(remaining) = params.min_age.checked_sub(started.elapsed()) {
            tokio::time::sleep(remaining).await;
        }

        let mut batch = vec![first];
        let mut batch_bytes = batch[0].size_bytes();
        {
            let mut state = self.state.lock();
            while batch.len() < params.max_size && started.elapsed() < params.max_age {
                let front_bytes = match state.queue.front() {
                    Some(front) => front.size_bytes(),
                    None => break,
                };
                if batch_bytes + front_bytes > params.max_bytes {
                    break;
                }
                // Popped items are gone from the counters immediately
                let Some(item) = state.queue.pop_front() else {
                    break;
                };
                state.count -= 1;
                state.bytes -= item.size_bytes();
                batch_bytes += item.size_bytes();
                batch.push(item);
            }
        }
        batch
    }

    fn pop_one(&self) -> Option<BufferedItem> {
        let mut state = self.state.lock();
        let item = state.queue.pop_front()?;
        state.count -= 1;
        state.bytes -= item.size_bytes();
        Some(item)
    }

    pub fn len(&self) -> usize {
        self.state.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> usize {
        self.state.lock().bytes
    }
}

impl Default for SpanBuffer {
    fn default() -> Self {
        Self::new(EnqueueLimits::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================
