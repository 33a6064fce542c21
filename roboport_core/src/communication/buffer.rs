//! Bounded record buffer shared by one connection's producer and consumer
//!
//! The producer is the source port's writer (a component tick thread or a
//! remote delivery thread); the consumer is the sink component. A
//! `parking_lot` mutex guards the queue and two condvars wake the side that
//! is waiting.

use super::policy::OverflowPolicy;
use parking_lot::{Condvar, Mutex};
use roboport_types::Record;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// What happened to a pushed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    /// Enqueued after discarding the oldest unread record
    DroppedOldest,
    /// The incoming record was discarded
    DroppedNewest,
    /// The buffer was closed by a disconnect
    Closed,
}

/// Result of a bounded wait on the consumer side
#[derive(Debug, Clone, PartialEq)]
pub enum PopOutcome {
    Record(Record),
    /// Buffer closed and drained
    Closed,
    TimedOut(Duration),
}

struct BufferState {
    queue: VecDeque<Record>,
    closed: bool,
}

pub struct RecordBuffer {
    capacity: usize,
    state: Mutex<BufferState>,
    not_empty: Condvar,
    not_full: Condvar,
    delivered: AtomicU64,
    dropped: AtomicU64,
    consumed: AtomicU64,
}

impl RecordBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(BufferState {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
        }
    }

    /// Push a record under `overflow`.
    ///
    /// Only [`OverflowPolicy::Block`] can fail: `Err(waited)` when no slot
    /// freed up within `block_timeout`.
    pub fn push(
        &self,
        record: Record,
        overflow: OverflowPolicy,
        block_timeout: Duration,
    ) -> Result<PushOutcome, Duration> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(PushOutcome::Closed);
        }

        let outcome = if state.queue.len() < self.capacity {
            PushOutcome::Enqueued
        } else {
            match overflow {
                OverflowPolicy::DropOldest => {
                    state.queue.pop_front();
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    PushOutcome::DroppedOldest
                }
                OverflowPolicy::DropNewest => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return Ok(PushOutcome::DroppedNewest);
                }
                OverflowPolicy::Block => {
                    let start = Instant::now();
                    let deadline = start + block_timeout;
                    while state.queue.len() >= self.capacity && !state.closed {
                        if self.not_full.wait_until(&mut state, deadline).timed_out()
                            && state.queue.len() >= self.capacity
                        {
                            return Err(start.elapsed());
                        }
                    }
                    if state.closed {
                        return Ok(PushOutcome::Closed);
                    }
                    PushOutcome::Enqueued
                }
            }
        };

        state.queue.push_back(record);
        self.delivered.fetch_add(1, Ordering::Relaxed);
        drop(state);
        self.not_empty.notify_one();
        Ok(outcome)
    }

    /// Oldest unread record, if any
    pub fn pop(&self) -> Option<Record> {
        let record = self.state.lock().queue.pop_front();
        if record.is_some() {
            self.consumed.fetch_add(1, Ordering::Relaxed);
            self.not_full.notify_one();
        }
        record
    }

    /// Wait up to `timeout` for a record
    pub fn pop_timeout(&self, timeout: Duration) -> PopOutcome {
        let start = Instant::now();
        let deadline = start + timeout;
        let mut state = self.state.lock();

        loop {
            if let Some(record) = state.queue.pop_front() {
                drop(state);
                self.consumed.fetch_add(1, Ordering::Relaxed);
                self.not_full.notify_one();
                return PopOutcome::Record(record);
            }
            if state.closed {
                return PopOutcome::Closed;
            }
            if self.not_empty.wait_until(&mut state, deadline).timed_out()
                && state.queue.is_empty()
            {
                return if state.closed {
                    PopOutcome::Closed
                } else {
                    PopOutcome::TimedOut(start.elapsed())
                };
            }
        }
    }

    /// Close the buffer and wake everyone waiting on it.
    /// Records already buffered stay readable.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Discard everything still buffered, returning how many were dropped
    pub fn drain(&self) -> usize {
        let drained = {
            let mut state = self.state.lock();
            let n = state.queue.len();
            state.queue.clear();
            n
        };
        if drained > 0 {
            self.dropped.fetch_add(drained as u64, Ordering::Relaxed);
            self.not_full.notify_all();
        }
        drained
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }
}
