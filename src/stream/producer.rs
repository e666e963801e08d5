//! Producer-facing half of the bridge

use std::io;
use std::sync::Arc;

use bytes::Bytes;

use super::queue::Chunk;
use super::shared::Shared;
use crate::utils::{Result, StreamError};

/// Handle used by the engine side to deliver chunks
///
/// Dropping the handle before [`Producer::signal_eof`] or [`Producer::fail`]
/// records a broken-pipe failure so the reader is never left blocked.
pub struct Producer {
    shared: Arc<Shared>,
    high_water_mark: usize,
}

impl Producer {
    pub(crate) fn new(shared: Arc<Shared>, high_water_mark: usize) -> Self {
        Self {
            shared,
            high_water_mark,
        }
    }

    /// Buffered bytes at which a pumping producer should stop delivering
    ///
    /// Taken from [`BridgeConfig::high_water_mark`](crate::BridgeConfig::high_water_mark).
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// Deliver a chunk and wake the reader
    ///
    /// Chunks delivered after the consumer closed the stream are dropped.
    pub fn append_chunk(&self, data: impl Into<Bytes>) -> Result<()> {
        let chunk = Chunk::new(data);
        let len = chunk.remaining();

        let mut state = self.shared.lock();
        if state.closed {
            log::trace!("dropping {} bytes delivered after close", len);
            return Ok(());
        }
        state.queue.append(chunk)?;
        if len == 0 {
            return Ok(());
        }
        state.stats.chunks_appended += 1;
        state.stats.bytes_appended += len as u64;
        drop(state);

        log::trace!("appended chunk of {} bytes", len);
        self.shared.notify_one();
        Ok(())
    }

    /// Signal that no more chunks will be delivered
    pub fn signal_eof(&self) -> Result<()> {
        let mut state = self.shared.lock();
        if state.closed {
            return Ok(());
        }
        state.queue.mark_eof()?;
        let total = state.stats.bytes_appended;
        drop(state);

        log::debug!("end of stream after {} bytes", total);
        self.shared.notify_all();
        Ok(())
    }

    /// Record a failure of the underlying channel
    ///
    /// Bytes already buffered are still delivered; the reader then sees the
    /// failure instead of end of stream. Ignored once the stream has ended.
    pub fn fail(&self, err: &io::Error) {
        let mut state = self.shared.lock();
        if state.closed || state.queue.is_eof() {
            log::debug!("ignoring producer failure after end of stream: {}", err);
            return;
        }
        // Nothing else may be appended after a failure; EOF is unset per the guard above.
        let marked = state.queue.mark_eof();
        debug_assert!(marked.is_ok());
        state.failure = Some(StreamError::producer(err));
        drop(state);

        log::warn!("producer failed: {}", err);
        self.shared.notify_all();
    }

    /// Whether the consumer has closed the stream
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Bytes queued and not yet read
    pub fn buffered_len(&self) -> usize {
        self.shared.lock().queue.buffered_len()
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        let state = self.shared.lock();
        let finished = state.closed || state.queue.is_eof();
        drop(state);

        if !finished {
            log::warn!("producer dropped before end of stream");
            self.fail(&io::Error::new(
                io::ErrorKind::BrokenPipe,
                "producer dropped before end of stream",
            ));
        }
    }
}
