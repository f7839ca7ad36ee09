//! Paired-device listing, pairing, and time-boxed discovery.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use log::{debug, info, warn};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::platform::{Adapter, ScanStream};
use crate::types::{Address, Device};

/// Devices found by the running scan, one item per newly seen address.
/// Ends when the scan window elapses or the scan is stopped.
pub struct DiscoveryStream {
    rx: mpsc::UnboundedReceiver<Device>,
}

impl Stream for DiscoveryStream {
    type Item = Device;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

struct ScanTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Registry side of the session: everything about devices that does not
/// need an open connection.
pub(crate) struct DeviceRegistry<A: Adapter> {
    adapter: Arc<A>,
    scan_duration: Duration,
    scan: Mutex<Option<ScanTask>>,
}

impl<A: Adapter> DeviceRegistry<A> {
    pub fn new(adapter: Arc<A>, config: &SessionConfig) -> Self {
        DeviceRegistry {
            adapter,
            scan_duration: config.scan_duration,
            scan: Mutex::new(None),
        }
    }

    pub async fn is_enabled(&self) -> bool {
        self.adapter.is_powered().await
    }

    pub async fn list_paired(&self) -> Result<Vec<Device>> {
        if !self.adapter.is_powered().await {
            return Err(SessionError::PlatformUnavailable {
                reason: "radio is powered off".to_string(),
            });
        }
        self.adapter.bonded_devices().await
    }

    pub async fn is_paired(&self, address: &Address) -> Result<bool> {
        self.adapter.is_bonded(address).await
    }

    /// Run the platform pairing flow; resolves with the bonded device.
    pub async fn pair(&self, address: &Address) -> Result<Device> {
        info!("Requesting bond with {address}");
        let device = self.adapter.bond(address).await?;
        info!("Bonded with {} ({:?})", device.address, device.name);
        Ok(device)
    }

    pub async fn is_discovering(&self) -> bool {
        let guard = self.scan.lock().await;
        guard
            .as_ref()
            .map(|task| !task.handle.is_finished())
            .unwrap_or(false)
    }

    /// Start a scan window. Fails with [`SessionError::AlreadyDiscovering`]
    /// while a previous window is still live; a window that ended on its
    /// own clears the way for the next one.
    pub async fn start_discovery(&self) -> Result<DiscoveryStream> {
        let mut guard = self.scan.lock().await;
        if let Some(task) = guard.as_ref() {
            if !task.handle.is_finished() {
                return Err(SessionError::AlreadyDiscovering);
            }
        }
        let scan = self.adapter.scan().await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_scan(scan, tx, cancel.clone(), self.scan_duration));
        *guard = Some(ScanTask { cancel, handle });
        info!(
            "Discovery started ({}s window)",
            self.scan_duration.as_secs()
        );
        Ok(DiscoveryStream { rx })
    }

    /// Stop the running scan, if any, and wait for it to wind down.
    pub async fn stop_discovery(&self) -> Result<()> {
        let task = self.scan.lock().await.take();
        let Some(task) = task else {
            debug!("Stop requested with no discovery running");
            return Ok(());
        };
        task.cancel.cancel();
        if let Err(err) = task.handle.await {
            warn!("Discovery task ended abnormally: {err}");
        }
        info!("Discovery stopped");
        Ok(())
    }
}

/// Forward scan results until the window closes, the scan is cancelled, or
/// the platform stream dries up. Each address is reported at most once per
/// window; platforms re-announce devices freely.
async fn run_scan(
    mut scan: ScanStream,
    tx: mpsc::UnboundedSender<Device>,
    cancel: CancellationToken,
    window: Duration,
) {
    let mut seen: HashSet<Address> = HashSet::new();
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Discovery cancelled");
                break;
            }
            _ = &mut deadline => {
                debug!("Discovery window elapsed");
                break;
            }
            found = scan.next() => match found {
                Some(device) => {
                    if !seen.insert(device.address.clone()) {
                        continue;
                    }
                    debug!("Found {} ({:?}, {:?} dBm)", device.address, device.name, device.rssi);
                    if tx.send(device).is_err() {
                        debug!("Discovery consumer dropped, ending scan");
                        break;
                    }
                }
                None => {
                    debug!("Platform scan stream ended");
                    break;
                }
            }
        }
    }
}
