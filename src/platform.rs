//! The seam between session logic and the platform radio.
//!
//! Everything the crate knows about real Bluetooth hardware goes through
//! [`Adapter`]; session code never touches an OS API directly. A production
//! backend wraps the platform stack (BlueZ RFCOMM sockets, Android
//! `BluetoothSocket`, ...) behind this trait, usually opening channels
//! against [`crate::constants::SPP_SERVICE_UUID`]. Tests and the bundled
//! demo use [`crate::loopback`] instead.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;
use crate::types::{Address, Device, Security};

/// Byte-stream handle for one open serial link.
pub trait SerialLink: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> SerialLink for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Devices produced by a running scan. The stream may report the same
/// device more than once; de-duplication happens in the session layer.
pub type ScanStream = BoxStream<'static, Device>;

/// Handle to the platform radio.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Transport produced by [`Adapter::open`].
    type Link: SerialLink;

    /// Whether the radio is present and powered on.
    async fn is_powered(&self) -> bool;

    /// The platform's currently bonded devices.
    async fn bonded_devices(&self) -> Result<Vec<Device>>;

    /// Whether the device at `address` is bonded.
    async fn is_bonded(&self, address: &Address) -> Result<bool>;

    /// Run the platform pairing flow against `address`; resolves once the
    /// handshake completes or fails.
    async fn bond(&self, address: &Address) -> Result<Device>;

    /// Begin a scan. The stream keeps producing sightings until it is
    /// dropped or the platform gives up on its own.
    async fn scan(&self) -> Result<ScanStream>;

    /// Open a serial link to `address`, negotiating the channel in the
    /// requested [`Security`] mode.
    async fn open(&self, address: &Address, security: Security) -> Result<Self::Link>;

    /// Most recent signal strength, in dBm, for the link to `address`.
    async fn link_rssi(&self, address: &Address) -> Result<i16>;
}
