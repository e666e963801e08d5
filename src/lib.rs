//! # Binix Stream - engine body bytes for blocking readers
//!
//! The engine delivers response bodies as discrete chunks, possibly from its
//! own threads, and pauses its channel until asked to resume. Embedders want
//! a plain blocking byte stream. This crate sits in between.
//!
//! ## Architecture
//!
//! - **stream**: chunk queue, blocking bridge, producer handle, header
//!   sniffing and the async chunk pump
//! - **config**: bridge configuration
//! - **utils**: shared error types
//!
//! ```no_run
//! use binix_stream::{BridgeConfig, stream};
//!
//! let (producer, bridge) = stream::open(BridgeConfig::default(), ());
//! std::thread::spawn(move || {
//!     producer.append_chunk(&b"%PDF-1.7"[..]).unwrap();
//!     producer.signal_eof().unwrap();
//! });
//!
//! assert!(bridge.check_header(&[b"%PDF-"]).unwrap());
//! let mut body = Vec::new();
//! std::io::copy(&mut &bridge, &mut body).unwrap();
//! ```

pub mod config;
pub mod stream;
pub mod utils;

// Re-export main types for convenience
pub use config::BridgeConfig;
pub use stream::{Producer, ReadOutcome, StreamBridge, StreamSupport};
pub use utils::error::{Result, StreamError};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "Binix Stream";
