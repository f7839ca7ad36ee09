//! The session facade, one method per bridge command.

use std::sync::Arc;

use log::debug;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::platform::Adapter;
use crate::session::connection::ConnectionController;
use crate::session::dispatcher::SubscriptionStream;
use crate::session::health::LinkHealthMonitor;
use crate::session::registry::{DeviceRegistry, DiscoveryStream};
use crate::types::{Address, ConnectionState, Device, Security};

/// Manages one serial session over a platform [`Adapter`]: device
/// discovery and pairing, a single connection's lifecycle, and the buffered
/// byte stream flowing through it.
///
/// Every method takes `&self`, so an instance shared through an [`Arc`]
/// can serve commands from any number of tasks; internal state is guarded
/// per concern. Instances are fully independent of each other.
pub struct SessionManager<A: Adapter> {
    registry: DeviceRegistry<A>,
    controller: ConnectionController<A>,
    health: LinkHealthMonitor<A>,
}

impl<A: Adapter> SessionManager<A> {
    /// Build a manager over `adapter` with default tuning.
    pub fn new(adapter: A) -> Self {
        Self::with_config(adapter, SessionConfig::default())
    }

    pub fn with_config(adapter: A, config: SessionConfig) -> Self {
        let adapter = Arc::new(adapter);
        SessionManager {
            registry: DeviceRegistry::new(adapter.clone(), &config),
            controller: ConnectionController::new(adapter.clone(), &config),
            health: LinkHealthMonitor::new(adapter),
        }
    }

    /// Whether the radio is present and powered on.
    pub async fn is_enabled(&self) -> bool {
        self.registry.is_enabled().await
    }

    /// The platform's bonded devices.
    pub async fn list_paired(&self) -> Result<Vec<Device>> {
        self.registry.list_paired().await
    }

    pub async fn is_paired(&self, address: &Address) -> Result<bool> {
        self.registry.is_paired(address).await
    }

    /// Run the platform pairing flow; resolves with the bonded device once
    /// the handshake completes.
    pub async fn pair(&self, address: &Address) -> Result<Device> {
        self.registry.pair(address).await
    }

    /// Start a discovery scan window and stream the devices it finds, each
    /// address at most once per window.
    pub async fn start_discovery(&self) -> Result<DiscoveryStream> {
        self.registry.start_discovery().await
    }

    /// End the running scan early. A no-op when none is running.
    pub async fn stop_discovery(&self) -> Result<()> {
        self.registry.stop_discovery().await
    }

    pub async fn is_discovering(&self) -> bool {
        self.registry.is_discovering().await
    }

    /// Connect to `address` in the requested [`Security`] mode. An active
    /// scan is stopped first: inquiry traffic degrades link setup.
    pub async fn connect(&self, address: &Address, security: Security) -> Result<()> {
        if self.controller.state().await == ConnectionState::Disconnected
            && self.registry.is_discovering().await
        {
            debug!("Stopping discovery ahead of connection attempt");
            self.registry.stop_discovery().await?;
        }
        self.controller.connect(address, security).await
    }

    /// Tear down the connection or cancel a pending attempt. Idempotent.
    pub async fn disconnect(&self) -> Result<()> {
        self.controller.disconnect().await
    }

    pub async fn is_connected(&self) -> bool {
        self.controller.is_connected().await
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.controller.state().await
    }

    /// Bytes currently sitting in the receive buffer.
    pub async fn available(&self) -> Result<usize> {
        self.controller.available().await
    }

    /// Drain the whole receive buffer; empty when nothing has arrived.
    pub async fn read(&self) -> Result<Vec<u8>> {
        self.controller.read().await
    }

    /// Drain the buffer through the first occurrence of `delimiter`, or
    /// fail with [`SessionError::DelimiterNotFound`] when no complete
    /// frame is buffered yet.
    pub async fn read_until(&self, delimiter: &[u8]) -> Result<Vec<u8>> {
        self.controller.read_until(delimiter).await
    }

    /// Discard everything buffered.
    pub async fn clear(&self) -> Result<()> {
        self.controller.clear().await
    }

    /// Send `data` over the link. Resolves once the transport has taken
    /// the bytes; concurrent writes go out in queue order, never
    /// interleaved.
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        self.controller.write(data).await
    }

    /// Stream `delimiter`-framed data from the live connection, starting
    /// with frames already buffered. Replaces any previous subscription.
    pub async fn subscribe(&self, delimiter: &[u8]) -> Result<SubscriptionStream> {
        self.controller.subscribe(delimiter).await
    }

    /// Drop the active subscription; its stream ends. A no-op without one.
    pub async fn unsubscribe(&self) -> Result<()> {
        self.controller.unsubscribe().await
    }

    /// Signal strength of the live link, in dBm.
    pub async fn read_rssi(&self) -> Result<i16> {
        let address = self
            .controller
            .connected_address()
            .await
            .ok_or(SessionError::NotConnected)?;
        self.health.read_rssi(&address).await
    }
}
