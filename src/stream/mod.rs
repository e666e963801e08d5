//! Chunked byte-stream bridge
//!
//! Adapts chunk delivery from the engine into a blocking, pull-based reader:
//! - FIFO chunk queue with end-of-stream signaling
//! - One resume request to the producer per empty period
//! - Non-destructive header sniffing
//! - Close from any thread, waking a blocked reader

mod bridge;
mod producer;
pub mod pump;
mod queue;
mod shared;
pub mod sniff;
mod support;

use std::sync::Arc;

pub use bridge::{ReadOutcome, StreamBridge};
pub use producer::Producer;
pub use pump::{ResumeListener, ResumeSignal, pump, resume_channel};
pub use queue::{BufferQueue, Chunk};
pub use shared::BridgeStats;
pub use support::{ResumeFn, StreamSupport, resume_fn};

use crate::config::BridgeConfig;
use shared::Shared;

/// Open a bridge, returning the producer handle and the reader
///
/// `support` receives resume requests and the final close.
pub fn open<S>(config: BridgeConfig, support: S) -> (Producer, StreamBridge)
where
    S: StreamSupport + 'static,
{
    log::debug!(
        "opening stream bridge (sniff {} bytes, timeout {:?})",
        config.sniff_len,
        config.read_timeout
    );
    let shared = Arc::new(Shared::new(Box::new(support)));
    (
        Producer::new(shared.clone(), config.high_water_mark),
        StreamBridge::new(shared, config),
    )
}
