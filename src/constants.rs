//! Protocol constants and session defaults.

use std::time::Duration;

use uuid::Uuid;

/// Well-known Serial Port Profile service UUID.
///
/// Platform backends use this record when opening an RFCOMM channel to a
/// peer that does not advertise a custom serial service.
pub const SPP_SERVICE_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// Default deadline for one outgoing connection attempt, including channel
/// negotiation.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default length of one discovery scan window. Chosen to match the inquiry
/// duration of common platform stacks.
pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(12);

/// Default size of a single inbound transport read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Default depth of the per-connection outbound write queue.
pub const DEFAULT_WRITE_QUEUE_DEPTH: usize = 32;
