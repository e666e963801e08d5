//! State shared by the producer handle and the bridge
//!
//! Queue, flow-control flag and close state live behind one mutex; the
//! "one resume per empty period" rule spans all of them.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, WaitTimeoutResult};
use std::time::Duration;

use super::queue::{BufferQueue, Chunk};
use super::support::StreamSupport;
use crate::utils::StreamError;

/// Counters describing traffic through a bridge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Non-empty chunks accepted from the producer
    pub chunks_appended: u64,
    /// Bytes accepted from the producer
    pub bytes_appended: u64,
    /// Bytes handed to the consumer
    pub bytes_read: u64,
    /// Resume signals sent to the producer
    pub resume_requests: u64,
}

pub(crate) struct State {
    pub queue: BufferQueue,
    /// Sniffed bytes replayed before the queue
    pub replay: Option<Chunk>,
    pub closed: bool,
    pub must_request_more: bool,
    /// Sticky producer failure, reported once buffered bytes are drained
    pub failure: Option<StreamError>,
    pub stats: BridgeStats,
}

impl State {
    fn new() -> Self {
        Self {
            queue: BufferQueue::new(),
            replay: None,
            closed: false,
            must_request_more: true,
            failure: None,
            stats: BridgeStats::default(),
        }
    }

    /// Copy buffered bytes into `buf`, replay first, then the head chunk
    ///
    /// Returns `None` when nothing is buffered. Draining the queue re-arms
    /// the resume request for the next empty period.
    pub fn take_buffered(&mut self, buf: &mut [u8]) -> Option<usize> {
        if let Some(replay) = self.replay.as_mut() {
            let count = replay.read_into(buf);
            if replay.is_consumed() {
                self.replay = None;
            }
            if count > 0 {
                self.stats.bytes_read += count as u64;
                return Some(count);
            }
        }

        let head = self.queue.head_mut()?;
        let count = head.read_into(buf);
        if head.is_consumed() {
            self.queue.pop_head();
            if self.queue.is_empty() {
                self.must_request_more = true;
            }
        }
        self.stats.bytes_read += count as u64;
        Some(count)
    }

    /// Put sniffed bytes back in front of everything still unread
    pub fn restore(&mut self, mut sniffed: Vec<u8>) {
        if self.closed {
            return;
        }
        self.stats.bytes_read = self.stats.bytes_read.saturating_sub(sniffed.len() as u64);
        if let Some(rest) = self.replay.take() {
            sniffed.extend_from_slice(rest.as_slice());
        }
        if !sniffed.is_empty() {
            self.replay = Some(Chunk::new(sniffed));
        }
    }

    /// Bytes readable without blocking from the first contiguous buffer
    pub fn head_available(&self) -> usize {
        match &self.replay {
            Some(replay) if !replay.is_consumed() => replay.remaining(),
            _ => self.queue.peek_head().map_or(0, Chunk::remaining),
        }
    }
}

pub(crate) struct Shared {
    state: Mutex<State>,
    ready: Condvar,
    pub support: Box<dyn StreamSupport>,
}

impl Shared {
    pub fn new(support: Box<dyn StreamSupport>) -> Self {
        Self {
            state: Mutex::new(State::new()),
            ready: Condvar::new(),
            support,
        }
    }

    /// Lock the state, recovering from a panicked holder
    pub fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn wait<'a>(&self, guard: MutexGuard<'a, State>) -> MutexGuard<'a, State> {
        self.ready.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    pub fn wait_timeout<'a>(
        &self,
        guard: MutexGuard<'a, State>,
        timeout: Duration,
    ) -> (MutexGuard<'a, State>, WaitTimeoutResult) {
        self.ready
            .wait_timeout(guard, timeout)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Wake the single blocked consumer
    pub fn notify_one(&self) {
        self.ready.notify_one();
    }

    /// Wake every waiter on a terminal transition (EOF, failure, close)
    pub fn notify_all(&self) {
        self.ready.notify_all();
    }
}
