//! Blocking read side of the bridge
//!
//! A read blocks only while the queue is empty, the stream has not ended and
//! the bridge is open. Before the first wait of each empty period the bridge
//! asks the producer to resume, exactly once.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::shared::{BridgeStats, Shared};
use super::sniff::SniffBuffer;
use crate::config::BridgeConfig;
use crate::utils::{Result, StreamError};

const SKIP_BUFFER_LEN: usize = 8 * 1024;

/// Result of a single read call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes copied into the destination; non-zero unless it was empty
    Read(usize),
    /// End of stream, or the stream was closed while the read was blocked
    End,
}

impl ReadOutcome {
    /// Bytes read, `None` at end of stream
    pub fn bytes(self) -> Option<usize> {
        match self {
            Self::Read(n) => Some(n),
            Self::End => None,
        }
    }

    pub fn is_end(self) -> bool {
        self == Self::End
    }
}

/// Pull-based byte stream over chunks delivered by a [`Producer`](super::Producer)
///
/// All methods take `&self`, so the bridge can be shared (e.g. in an `Arc`)
/// with a thread that closes it while another thread is blocked in `read`.
/// Dropping the bridge closes it.
pub struct StreamBridge {
    shared: Arc<Shared>,
    config: BridgeConfig,
}

impl StreamBridge {
    pub(crate) fn new(shared: Arc<Shared>, config: BridgeConfig) -> Self {
        Self { shared, config }
    }

    /// Bridge configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Read up to `buf.len()` bytes, blocking while nothing is buffered
    ///
    /// This is a partial read: callers that need an exact count must loop.
    /// Honors [`BridgeConfig::read_timeout`].
    pub fn read(&self, buf: &mut [u8]) -> Result<ReadOutcome> {
        let deadline = self.config.read_timeout.map(|timeout| Instant::now() + timeout);
        self.read_until(buf, deadline)
    }

    /// Like [`read`](Self::read) with an explicit deadline for this call
    pub fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<ReadOutcome> {
        self.read_until(buf, Some(Instant::now() + timeout))
    }

    /// Read up to `max_len` bytes into `dest` starting at `offset`
    pub fn read_into(&self, dest: &mut [u8], offset: usize, max_len: usize) -> Result<ReadOutcome> {
        let capacity = dest.len();
        let end = offset
            .checked_add(max_len)
            .filter(|&end| end <= capacity)
            .ok_or(StreamError::InvalidRange {
                offset,
                len: max_len,
                capacity,
            })?;
        self.read(&mut dest[offset..end])
    }

    fn read_until(&self, buf: &mut [u8], deadline: Option<Instant>) -> Result<ReadOutcome> {
        let mut state = self.shared.lock();
        if state.closed {
            return Err(StreamError::Closed);
        }
        if buf.is_empty() {
            return Ok(ReadOutcome::Read(0));
        }

        loop {
            if let Some(count) = state.take_buffered(buf) {
                return Ok(ReadOutcome::Read(count));
            }
            if state.closed {
                return Ok(ReadOutcome::End);
            }
            if let Some(err) = &state.failure {
                return Err(err.clone());
            }
            if state.queue.is_eof() {
                return Ok(ReadOutcome::End);
            }

            if state.must_request_more {
                state.must_request_more = false;
                state.stats.resume_requests += 1;
                drop(state);

                log::debug!("queue empty, requesting more data");
                self.shared.support.resume();

                state = self.shared.lock();
                continue;
            }

            state = match deadline {
                None => self.shared.wait(state),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        log::debug!("read timed out waiting for data");
                        return Err(StreamError::TimedOut);
                    }
                    self.shared.wait_timeout(state, deadline - now).0
                }
            };
        }
    }

    /// Whether the next bytes of the stream start with any of `candidates`
    ///
    /// Reads up to [`BridgeConfig::sniff_len`] bytes, stopping early at end
    /// of stream. The sniffed bytes are replayed by the following reads, so
    /// a sequential read afterwards still sees the stream from where it was.
    pub fn check_header<H: AsRef<[u8]>>(&self, candidates: &[H]) -> Result<bool> {
        if self.shared.lock().closed {
            return Err(StreamError::Closed);
        }
        let mut sniff = SniffBuffer::with_capacity(self.config.sniff_len);
        let mut outcome = Ok(());

        while !sniff.is_full() {
            match self.read(sniff.unfilled_mut()) {
                Ok(ReadOutcome::Read(count)) => sniff.advance(count),
                Ok(ReadOutcome::End) => break,
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }

        let matched = sniff.matches_any(candidates);
        log::debug!(
            "sniffed {} bytes, header {}",
            sniff.len(),
            if matched { "matched" } else { "not matched" }
        );
        self.shared.lock().restore(sniff.into_bytes());

        outcome.map(|_| matched)
    }

    /// Discard up to `n` bytes, returning how many were skipped
    pub fn skip(&self, n: u64) -> Result<u64> {
        let mut scratch = [0u8; SKIP_BUFFER_LEN];
        let mut skipped = 0u64;

        while skipped < n {
            let want = (n - skipped).min(SKIP_BUFFER_LEN as u64) as usize;
            match self.read(&mut scratch[..want])? {
                ReadOutcome::Read(count) => skipped += count as u64,
                ReadOutcome::End => break,
            }
        }
        Ok(skipped)
    }

    /// Bytes readable right now without blocking
    ///
    /// Counts only the first buffered chunk; zero when nothing is buffered
    /// or the bridge is closed.
    pub fn available(&self) -> usize {
        let state = self.shared.lock();
        if state.closed {
            0
        } else {
            state.head_available()
        }
    }

    /// Close the stream, releasing buffered chunks and the underlying channel
    ///
    /// Wakes a blocked reader, which returns [`ReadOutcome::End`]. Calling
    /// this more than once has no further effect.
    pub fn close(&self) {
        let mut state = self.shared.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let released = state.queue.buffered_len();
        state.queue.clear();
        state.replay = None;
        drop(state);

        self.shared.notify_all();
        log::debug!("stream closed, released {} buffered bytes", released);
        self.shared.support.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Whether every byte has been read and the producer signaled the end
    ///
    /// A failed producer never reports end of stream.
    pub fn is_eof(&self) -> bool {
        let state = self.shared.lock();
        state.queue.is_eof()
            && state.failure.is_none()
            && state.queue.is_empty()
            && state.replay.is_none()
    }

    /// Traffic counters
    pub fn stats(&self) -> BridgeStats {
        self.shared.lock().stats
    }
}

impl Drop for StreamBridge {
    fn drop(&mut self) {
        self.close();
    }
}

impl io::Read for &StreamBridge {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match StreamBridge::read(*self, buf)? {
            ReadOutcome::Read(count) => Ok(count),
            ReadOutcome::End => Ok(0),
        }
    }
}

impl io::Read for StreamBridge {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut &*self, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::support::MockStreamSupport;
    use crate::stream::{self, Producer};
    use std::io::Read;
    use std::thread;

    fn open() -> (Producer, StreamBridge) {
        stream::open(BridgeConfig::default(), ())
    }

    fn read_all(bridge: &StreamBridge, chunk: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; chunk];
        while let ReadOutcome::Read(count) = bridge.read(&mut buf).unwrap() {
            out.extend_from_slice(&buf[..count]);
        }
        out
    }

    #[test]
    fn test_read_hello_then_end() {
        let (producer, bridge) = open();
        producer.append_chunk(&b"hel"[..]).unwrap();
        producer.append_chunk(&b"lo"[..]).unwrap();
        producer.signal_eof().unwrap();

        let mut buf = [0u8; 5];
        let mut filled = 0;
        while filled < 5 {
            filled += bridge.read(&mut buf[filled..]).unwrap().bytes().unwrap();
        }
        assert_eq!(&buf, b"hello");
        assert_eq!(bridge.read(&mut buf).unwrap(), ReadOutcome::End);
        assert!(bridge.is_eof());
    }

    #[test]
    fn test_read_does_not_span_chunks() {
        let (producer, bridge) = open();
        producer.append_chunk(&b"hel"[..]).unwrap();
        producer.append_chunk(&b"lo"[..]).unwrap();

        let mut buf = [0u8; 5];
        assert_eq!(bridge.read(&mut buf).unwrap(), ReadOutcome::Read(3));
        assert_eq!(bridge.read(&mut buf).unwrap(), ReadOutcome::Read(2));
        assert_eq!(&buf[..2], b"lo");
    }

    #[test]
    fn test_read_into_offset() {
        let (producer, bridge) = open();
        producer.append_chunk(&b"abc"[..]).unwrap();

        let mut dest = [b'.'; 6];
        assert_eq!(bridge.read_into(&mut dest, 2, 2).unwrap(), ReadOutcome::Read(2));
        assert_eq!(&dest, b"..ab..");

        assert_eq!(
            bridge.read_into(&mut dest, 5, 2),
            Err(StreamError::InvalidRange {
                offset: 5,
                len: 2,
                capacity: 6,
            })
        );
    }

    #[test]
    fn test_zero_length_read_does_not_block() {
        let (_producer, bridge) = open();
        assert_eq!(bridge.read(&mut []).unwrap(), ReadOutcome::Read(0));
        assert_eq!(bridge.stats().resume_requests, 0);
    }

    #[test]
    fn test_read_after_close_fails() {
        let (_producer, bridge) = open();
        bridge.close();
        let mut buf = [0u8; 4];
        assert_eq!(bridge.read(&mut buf), Err(StreamError::Closed));
        assert_eq!(bridge.check_header(&[b"x"]), Err(StreamError::Closed));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut support = MockStreamSupport::new();
        support.expect_close().times(1).return_const(());
        let (producer, bridge) = stream::open(BridgeConfig::default(), support);
        producer.append_chunk(&b"abc"[..]).unwrap();

        bridge.close();
        bridge.close();
        assert!(bridge.is_closed());
        assert_eq!(bridge.available(), 0);
        assert_eq!(producer.buffered_len(), 0);
        drop(bridge);
    }

    #[test]
    fn test_resume_once_per_empty_period() {
        let mut support = MockStreamSupport::new();
        support.expect_resume().times(2).return_const(());
        support.expect_close().times(1).return_const(());
        let config = BridgeConfig::default().with_read_timeout(Duration::from_millis(20));
        let (producer, bridge) = stream::open(config, support);

        let mut buf = [0u8; 4];
        assert_eq!(bridge.read(&mut buf), Err(StreamError::TimedOut));
        assert_eq!(bridge.read(&mut buf), Err(StreamError::TimedOut));
        assert_eq!(bridge.stats().resume_requests, 1);

        producer.append_chunk(&b"ab"[..]).unwrap();
        assert_eq!(bridge.read(&mut buf).unwrap(), ReadOutcome::Read(2));

        assert_eq!(bridge.read(&mut buf), Err(StreamError::TimedOut));
        assert_eq!(bridge.stats().resume_requests, 2);
    }

    #[test]
    fn test_partial_read_keeps_resume_armed_off() {
        let (producer, bridge) = open();
        producer.append_chunk(&b"abcd"[..]).unwrap();

        let mut buf = [0u8; 2];
        bridge.read(&mut buf).unwrap();
        assert_eq!(bridge.available(), 2);
        assert_eq!(bridge.stats().resume_requests, 0);
    }

    #[test]
    fn test_blocked_read_wakes_on_append() {
        let resumed = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = resumed.clone();
        let (producer, bridge) = stream::open(
            BridgeConfig::default(),
            stream::resume_fn(move || {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }),
        );

        let reader = thread::spawn(move || {
            let mut buf = [0u8; 8];
            let outcome = bridge.read(&mut buf).unwrap();
            (outcome, buf[0])
        });

        while resumed.load(std::sync::atomic::Ordering::SeqCst) == 0 {
            thread::yield_now();
        }
        producer.append_chunk(&b"x"[..]).unwrap();

        let (outcome, byte) = reader.join().unwrap();
        assert_eq!(outcome, ReadOutcome::Read(1));
        assert_eq!(byte, b'x');
        assert_eq!(resumed.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_unblocks_reader() {
        let (_producer, bridge) = open();
        let bridge = Arc::new(bridge);
        let reader_bridge = bridge.clone();

        let reader = thread::spawn(move || {
            let mut buf = [0u8; 8];
            reader_bridge.read(&mut buf)
        });

        while bridge.stats().resume_requests == 0 {
            thread::yield_now();
        }
        bridge.close();

        assert_eq!(reader.join().unwrap(), Ok(ReadOutcome::End));
    }

    #[test]
    fn test_producer_failure_after_buffered_bytes() {
        let (producer, bridge) = open();
        producer.append_chunk(&b"ok"[..]).unwrap();
        producer.fail(&io::Error::new(io::ErrorKind::ConnectionReset, "reset"));

        let mut buf = [0u8; 8];
        assert_eq!(bridge.read(&mut buf).unwrap(), ReadOutcome::Read(2));
        let err = bridge.read(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            StreamError::Producer {
                kind: io::ErrorKind::ConnectionReset,
                ..
            }
        ));
        // Sticky
        assert_eq!(bridge.read(&mut buf), Err(err));
    }

    #[test]
    fn test_failed_producer_is_not_eof() {
        let (producer, bridge) = open();
        producer.fail(&io::Error::new(io::ErrorKind::ConnectionReset, "reset"));

        let mut buf = [0u8; 8];
        assert!(matches!(
            bridge.read(&mut buf),
            Err(StreamError::Producer {
                kind: io::ErrorKind::ConnectionReset,
                ..
            })
        ));
        assert!(!bridge.is_eof());
    }

    #[test]
    fn test_check_header_after_close_with_empty_sniff() {
        let mut config = BridgeConfig::default();
        config.sniff_len = 0;
        let (_producer, bridge) = stream::open(config, ());
        bridge.close();

        assert_eq!(bridge.check_header(&[b"x"]), Err(StreamError::Closed));
    }

    #[test]
    fn test_dropped_producer_is_an_error() {
        let (producer, bridge) = open();
        drop(producer);

        let mut buf = [0u8; 8];
        assert!(matches!(
            bridge.read(&mut buf),
            Err(StreamError::Producer {
                kind: io::ErrorKind::BrokenPipe,
                ..
            })
        ));
    }

    #[test]
    fn test_check_header_is_non_destructive() {
        let (producer, bridge) = open();
        producer.append_chunk(&b"%PD"[..]).unwrap();
        producer.append_chunk(&b"F-1.4 rest of the document"[..]).unwrap();
        producer.signal_eof().unwrap();

        assert!(bridge.check_header(&[b"GIF8".as_slice(), b"%PDF-".as_slice()]).unwrap());
        assert_eq!(read_all(&bridge, 3), b"%PDF-1.4 rest of the document".to_vec());
    }

    #[test]
    fn test_check_header_short_stream() {
        let (producer, bridge) = open();
        producer.append_chunk(&b"AB"[..]).unwrap();
        producer.signal_eof().unwrap();

        assert!(!bridge.check_header(&[b"ABC"]).unwrap());
        assert!(bridge.check_header(&[b"AB"]).unwrap());
        assert_eq!(read_all(&bridge, 8), b"AB".to_vec());
    }

    #[test]
    fn test_check_header_after_partial_read() {
        let (producer, bridge) = open();
        producer.append_chunk(&b"xxABCDEF"[..]).unwrap();
        producer.signal_eof().unwrap();

        let mut buf = [0u8; 2];
        bridge.read(&mut buf).unwrap();
        assert!(bridge.check_header(&[b"ABC"]).unwrap());
        assert!(bridge.check_header(&[b"ABC"]).unwrap());
        assert_eq!(read_all(&bridge, 4), b"ABCDEF".to_vec());
        assert_eq!(bridge.stats().bytes_read, 8);
    }

    #[test]
    fn test_check_header_timeout_keeps_bytes() {
        let config = BridgeConfig::default().with_read_timeout(Duration::from_millis(10));
        let (producer, bridge) = stream::open(config, ());
        producer.append_chunk(&b"%PD"[..]).unwrap();

        assert_eq!(bridge.check_header(&[b"%PDF-"]), Err(StreamError::TimedOut));
        producer.append_chunk(&b"F-"[..]).unwrap();
        producer.signal_eof().unwrap();
        assert_eq!(read_all(&bridge, 16), b"%PDF-".to_vec());
    }

    #[test]
    fn test_skip() {
        let (producer, bridge) = open();
        producer.append_chunk(&b"0123"[..]).unwrap();
        producer.append_chunk(&b"4567"[..]).unwrap();
        producer.signal_eof().unwrap();

        assert_eq!(bridge.skip(6).unwrap(), 6);
        assert_eq!(read_all(&bridge, 8), b"67".to_vec());
        assert_eq!(bridge.skip(10).unwrap(), 0);
    }

    #[test]
    fn test_io_read_impl() {
        let (producer, mut bridge) = open();
        producer.append_chunk(&b"hello "[..]).unwrap();
        producer.append_chunk(&b"world"[..]).unwrap();
        producer.signal_eof().unwrap();

        let mut text = String::new();
        bridge.read_to_string(&mut text).unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn test_io_read_reports_closed() {
        let (_producer, bridge) = open();
        bridge.close();

        let mut buf = [0u8; 4];
        let err = io::Read::read(&mut &bridge, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }
}
