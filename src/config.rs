//! Bridge configuration

use std::time::Duration;

/// Default number of bytes captured for header sniffing
pub const DEFAULT_SNIFF_LEN: usize = 16;

/// Default buffered byte count above which the pump suspends delivery
pub const DEFAULT_HIGH_WATER_MARK: usize = 256 * 1024;

/// Stream bridge configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Size of the sniff buffer filled by `check_header`
    pub sniff_len: usize,
    /// Deadline for a single blocked read; `None` blocks until data, EOF or close
    pub read_timeout: Option<Duration>,
    /// Buffered bytes at which a pumping producer stops delivering
    pub high_water_mark: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            sniff_len: DEFAULT_SNIFF_LEN,
            read_timeout: None,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }
}

impl BridgeConfig {
    /// Set the sniff buffer size (at least one byte)
    pub fn with_sniff_len(mut self, sniff_len: usize) -> Self {
        self.sniff_len = sniff_len.max(1);
        self
    }

    /// Set the blocked read deadline
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the pump high-water mark (at least one byte)
    pub fn with_high_water_mark(mut self, bytes: usize) -> Self {
        self.high_water_mark = bytes.max(1);
        self
    }
}
