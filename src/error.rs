//! Typed failure surface for session operations.

use std::io;

use thiserror::Error;

use crate::types::Address;

/// Errors reported by the session manager and its components.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The radio is off, missing, or the OS denied access to it.
    #[error("bluetooth radio unavailable: {reason}")]
    PlatformUnavailable { reason: String },

    /// The given string is not a device address.
    #[error("malformed device address: {address:?}")]
    InvalidAddress { address: String },

    /// A discovery scan is already running.
    #[error("discovery already in progress")]
    AlreadyDiscovering,

    /// A connection attempt is already in flight.
    #[error("connection attempt already in progress")]
    AlreadyConnecting,

    /// A connection is already established.
    #[error("already connected to {address}")]
    AlreadyConnected { address: Address },

    /// The connection attempt failed, timed out, or was cancelled.
    #[error("failed to connect to {address}: {reason}")]
    ConnectFailed { address: Address, reason: String },

    /// The operation needs a live connection and none exists.
    #[error("not connected")]
    NotConnected,

    /// No occurrence of the requested delimiter is buffered yet.
    #[error("delimiter not found in receive buffer")]
    DelimiterNotFound,

    /// The live link failed mid-session; the connection has been torn down.
    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: io::Error,
    },
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, SessionError>;
