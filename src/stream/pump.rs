//! Async chunk pump
//!
//! Feeds a stream of chunks into a [`Producer`] on the async side. Delivery
//! is suspended while the queue holds at least the configured high-water mark
//! and resumes when the reader runs dry and the bridge asks for more.

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::Notify;

use super::producer::Producer;
use super::support::StreamSupport;
use crate::utils::{Result, StreamError};

/// Bridge-side end of a resume channel; install it as the bridge's support
pub struct ResumeSignal {
    notify: Arc<Notify>,
}

impl StreamSupport for ResumeSignal {
    fn resume(&self) {
        self.notify.notify_one();
    }

    fn close(&self) {
        // Let a suspended pump observe the close.
        self.notify.notify_one();
    }
}

/// Pump-side end of a resume channel
pub struct ResumeListener {
    notify: Arc<Notify>,
}

impl ResumeListener {
    /// Wait for the next resume (or close) signal
    pub async fn resumed(&self) {
        self.notify.notified().await;
    }
}

/// Create a connected resume signal/listener pair
pub fn resume_channel() -> (ResumeSignal, ResumeListener) {
    let notify = Arc::new(Notify::new());
    (
        ResumeSignal {
            notify: notify.clone(),
        },
        ResumeListener { notify },
    )
}

/// Deliver every chunk of `chunks` through `producer`, then signal EOF
///
/// Suspends while [`Producer::high_water_mark`] bytes or more are queued.
/// Returns the number of bytes delivered. Stops early without error when
/// the reader closes the bridge. A failed item is recorded on the bridge
/// and returned.
pub async fn pump<S, B>(
    producer: Producer,
    listener: ResumeListener,
    mut chunks: S,
) -> Result<u64>
where
    S: Stream<Item = io::Result<B>> + Unpin,
    B: Into<Bytes>,
{
    let high_water_mark = producer.high_water_mark();
    let mut delivered = 0u64;

    while let Some(item) = chunks.next().await {
        let chunk: Bytes = match item {
            Ok(chunk) => chunk.into(),
            Err(err) => {
                producer.fail(&err);
                return Err(StreamError::producer(&err));
            }
        };
        let len = chunk.len() as u64;
        producer.append_chunk(chunk)?;
        delivered += len;

        while !producer.is_closed() && producer.buffered_len() >= high_water_mark {
            log::trace!("suspending delivery at {} buffered bytes", producer.buffered_len());
            listener.resumed().await;
        }
        if producer.is_closed() {
            log::debug!("reader closed the stream after {} bytes", delivered);
            return Ok(delivered);
        }
    }

    producer.signal_eof()?;
    Ok(delivered)
}
