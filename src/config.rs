//! Session tuning knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_CHUNK_SIZE, DEFAULT_SCAN_DURATION,
    DEFAULT_WRITE_QUEUE_DEPTH,
};

/// Tunable parameters for one session manager instance.
///
/// The defaults suit typical SPP peripherals; embedders with chatty devices
/// or slow radios can override individual fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Deadline for one outgoing connection attempt.
    pub connect_timeout: Duration,
    /// Length of one discovery scan window; the scan ends on its own when
    /// the window elapses.
    pub scan_duration: Duration,
    /// Outbound writes queued per connection before callers start waiting
    /// for the transport to drain.
    pub write_queue_depth: usize,
    /// Size of a single inbound transport read.
    pub read_chunk_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            scan_duration: DEFAULT_SCAN_DURATION,
            write_queue_depth: DEFAULT_WRITE_QUEUE_DEPTH,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}
