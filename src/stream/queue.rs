//! Ordered chunk storage
//!
//! Chunks are kept in delivery order. Only the head chunk is ever partially
//! consumed; it is popped as soon as its last byte has been read.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::utils::{Result, StreamError};

/// One delivered buffer plus its read cursor
#[derive(Debug, Clone)]
pub struct Chunk {
    data: Bytes,
    offset: usize,
}

impl Chunk {
    /// Wrap delivered bytes
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            offset: 0,
        }
    }

    /// Unconsumed bytes
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Whether every byte has been read
    pub fn is_consumed(&self) -> bool {
        self.remaining() == 0
    }

    /// The unconsumed part of the chunk
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.offset..]
    }

    /// Copy as many bytes as fit into `dest` and advance the cursor
    pub fn read_into(&mut self, dest: &mut [u8]) -> usize {
        let count = dest.len().min(self.remaining());
        dest[..count].copy_from_slice(&self.data[self.offset..self.offset + count]);
        self.offset += count;
        count
    }
}

/// FIFO queue of chunks with an end-of-stream flag
#[derive(Debug, Default)]
pub struct BufferQueue {
    chunks: VecDeque<Chunk>,
    eof: bool,
}

impl BufferQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk at the tail
    ///
    /// Empty chunks are accepted and dropped so the head is never empty.
    pub fn append(&mut self, chunk: Chunk) -> Result<()> {
        if self.eof {
            return Err(StreamError::AppendAfterEof);
        }
        if !chunk.is_consumed() {
            self.chunks.push_back(chunk);
        }
        Ok(())
    }

    /// Record that no further chunks will arrive
    pub fn mark_eof(&mut self) -> Result<()> {
        if self.eof {
            return Err(StreamError::EofAlreadySignaled);
        }
        self.eof = true;
        Ok(())
    }

    /// The head chunk, if any
    pub fn peek_head(&self) -> Option<&Chunk> {
        self.chunks.front()
    }

    /// Mutable access to the head chunk for partial consumption
    pub fn head_mut(&mut self) -> Option<&mut Chunk> {
        self.chunks.front_mut()
    }

    /// Remove the head chunk
    pub fn pop_head(&mut self) -> Option<Chunk> {
        self.chunks.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Number of queued chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Sum of unconsumed bytes across all chunks
    pub fn buffered_len(&self) -> usize {
        self.chunks.iter().map(Chunk::remaining).sum()
    }

    /// Drop every buffered chunk, keeping the EOF flag
    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}
