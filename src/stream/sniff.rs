//! Header sniffing
//!
//! The sniffed prefix is kept and replayed ahead of the queue, so a consumer
//! that sniffs and then reads from the start still sees every byte.

/// Fixed-size capture of the next bytes of a stream
#[derive(Debug, Clone)]
pub struct SniffBuffer {
    data: Vec<u8>,
    filled: usize,
}

impl SniffBuffer {
    /// Create an empty buffer that holds up to `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            filled: 0,
        }
    }

    /// The part of the buffer still to fill
    pub fn unfilled_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.filled..]
    }

    /// Mark `n` more bytes as filled
    pub fn advance(&mut self, n: usize) {
        self.filled = (self.filled + n).min(self.data.len());
    }

    pub fn is_full(&self) -> bool {
        self.filled == self.data.len()
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Captured bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    /// Whether the captured bytes begin with any candidate header
    pub fn matches_any<H: AsRef<[u8]>>(&self, candidates: &[H]) -> bool {
        matches_any(self.as_slice(), candidates)
    }

    /// The captured bytes, for replay ahead of queued data
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.data.truncate(self.filled);
        self.data
    }
}

/// First candidate that `sniffed` starts with
///
/// Empty candidates are skipped; a candidate longer than `sniffed` never matches.
pub fn matches_any<H: AsRef<[u8]>>(sniffed: &[u8], candidates: &[H]) -> bool {
    candidates
        .iter()
        .map(AsRef::as_ref)
        .any(|header| !header.is_empty() && sniffed.starts_with(header))
}
