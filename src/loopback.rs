//! In-process [`Adapter`] backed by `tokio::io::duplex` pipes.
//!
//! [`LoopbackAdapter`] stands in for a platform radio: tests and the demo
//! register peers, flip the power switch, and drive the far end of every
//! link directly through [`LoopbackPeer::accept`]. Peers re-advertise on a
//! short interval while a scan is running, the way real inquiry results
//! repeat, so the session layer's de-duplication is exercised for free.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::error::{Result, SessionError};
use crate::platform::{Adapter, ScanStream};
use crate::types::{Address, Device, Security};

const LINK_PIPE_CAPACITY: usize = 4096;
const DEFAULT_PEER_RSSI: i16 = -50;
const DEFAULT_ADVERTISING_INTERVAL: Duration = Duration::from_millis(100);

struct PeerState {
    address: Address,
    name: Option<String>,
    rssi: i16,
    bonded: bool,
    discoverable: bool,
    connect_delay: Duration,
    refuse_connections: bool,
    fail_bonding: bool,
    last_security: Option<Security>,
    links: mpsc::UnboundedSender<DuplexStream>,
}

impl PeerState {
    fn device(&self) -> Device {
        Device::new(self.address.clone(), self.name.clone(), Some(self.rssi))
    }
}

struct AdapterState {
    powered: bool,
    advertising_interval: Duration,
    peers: HashMap<Address, Arc<Mutex<PeerState>>>,
}

impl AdapterState {
    fn visible_devices(&self) -> Vec<Device> {
        self.peers
            .values()
            .filter_map(|entry| {
                let peer = entry.lock().unwrap();
                peer.discoverable.then(|| peer.device())
            })
            .collect()
    }
}

/// A simulated radio with a configurable set of peers in range.
#[derive(Clone)]
pub struct LoopbackAdapter {
    inner: Arc<Mutex<AdapterState>>,
}

impl LoopbackAdapter {
    pub fn new() -> Self {
        LoopbackAdapter {
            inner: Arc::new(Mutex::new(AdapterState {
                powered: true,
                advertising_interval: DEFAULT_ADVERTISING_INTERVAL,
                peers: HashMap::new(),
            })),
        }
    }

    /// Power the simulated radio on or off.
    pub fn set_powered(&self, powered: bool) {
        self.inner.lock().unwrap().powered = powered;
    }

    /// Gap between advertising rounds while a scan runs.
    pub fn set_advertising_interval(&self, interval: Duration) {
        self.inner.lock().unwrap().advertising_interval = interval;
    }

    /// Put a peer in range and return the handle that controls it.
    pub fn add_peer(&self, address: Address) -> LoopbackPeer {
        let (links_tx, links_rx) = mpsc::unbounded_channel();
        let entry = Arc::new(Mutex::new(PeerState {
            address: address.clone(),
            name: None,
            rssi: DEFAULT_PEER_RSSI,
            bonded: false,
            discoverable: true,
            connect_delay: Duration::ZERO,
            refuse_connections: false,
            fail_bonding: false,
            last_security: None,
            links: links_tx,
        }));
        self.inner
            .lock()
            .unwrap()
            .peers
            .insert(address.clone(), entry.clone());
        LoopbackPeer {
            address,
            entry,
            links: links_rx,
        }
    }

    fn require_power(&self) -> Result<()> {
        if self.inner.lock().unwrap().powered {
            Ok(())
        } else {
            Err(SessionError::PlatformUnavailable {
                reason: "radio is powered off".to_string(),
            })
        }
    }

    fn peer_entry(&self, address: &Address) -> Option<Arc<Mutex<PeerState>>> {
        self.inner.lock().unwrap().peers.get(address).cloned()
    }
}

impl Default for LoopbackAdapter {
    fn default() -> Self {
        LoopbackAdapter::new()
    }
}

struct ScanRound {
    inner: Arc<Mutex<AdapterState>>,
    pending: VecDeque<Device>,
    interval: Duration,
    started: bool,
}

#[async_trait]
impl Adapter for LoopbackAdapter {
    type Link = DuplexStream;

    async fn is_powered(&self) -> bool {
        self.inner.lock().unwrap().powered
    }

    async fn bonded_devices(&self) -> Result<Vec<Device>> {
        self.require_power()?;
        let state = self.inner.lock().unwrap();
        Ok(state
            .peers
            .values()
            .filter_map(|entry| {
                let peer = entry.lock().unwrap();
                peer.bonded.then(|| peer.device())
            })
            .collect())
    }

    async fn is_bonded(&self, address: &Address) -> Result<bool> {
        Ok(self
            .peer_entry(address)
            .map(|entry| entry.lock().unwrap().bonded)
            .unwrap_or(false))
    }

    async fn bond(&self, address: &Address) -> Result<Device> {
        self.require_power()?;
        let entry = self
            .peer_entry(address)
            .ok_or_else(|| SessionError::PlatformUnavailable {
                reason: format!("no device in range at {address}"),
            })?;
        let mut peer = entry.lock().unwrap();
        if peer.fail_bonding {
            return Err(SessionError::PlatformUnavailable {
                reason: format!("pairing with {address} rejected by peer"),
            });
        }
        peer.bonded = true;
        Ok(peer.device())
    }

    async fn scan(&self) -> Result<ScanStream> {
        self.require_power()?;
        let interval = self.inner.lock().unwrap().advertising_interval;
        let round = ScanRound {
            inner: self.inner.clone(),
            pending: VecDeque::new(),
            interval,
            started: false,
        };
        let stream = stream::unfold(round, |mut round| async move {
            loop {
                if let Some(device) = round.pending.pop_front() {
                    return Some((device, round));
                }
                if round.started {
                    sleep(round.interval).await;
                }
                round.started = true;
                let snapshot = {
                    let state = round.inner.lock().unwrap();
                    if !state.powered {
                        return None;
                    }
                    state.visible_devices()
                };
                round.pending = snapshot.into();
            }
        });
        Ok(Box::pin(stream))
    }

    async fn open(&self, address: &Address, security: Security) -> Result<Self::Link> {
        self.require_power()?;
        let entry = self.peer_entry(address).ok_or_else(|| SessionError::Transport {
            source: io::Error::new(io::ErrorKind::NotFound, "no route to device"),
        })?;
        let (delay, refuse, links) = {
            let mut peer = entry.lock().unwrap();
            peer.last_security = Some(security);
            (
                peer.connect_delay,
                peer.refuse_connections,
                peer.links.clone(),
            )
        };
        if !delay.is_zero() {
            sleep(delay).await;
        }
        if refuse {
            return Err(SessionError::Transport {
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "peer refused the channel"),
            });
        }
        let (local, remote) = tokio::io::duplex(LINK_PIPE_CAPACITY);
        links.send(remote).map_err(|_| SessionError::Transport {
            source: io::Error::new(io::ErrorKind::ConnectionReset, "peer handle dropped"),
        })?;
        Ok(local)
    }

    async fn link_rssi(&self, address: &Address) -> Result<i16> {
        let entry = self.peer_entry(address).ok_or(SessionError::NotConnected)?;
        let rssi = entry.lock().unwrap().rssi;
        Ok(rssi)
    }
}

/// Control handle for one simulated peer.
///
/// Dropping the handle makes future connection attempts fail with a reset,
/// as if the device left range.
pub struct LoopbackPeer {
    address: Address,
    entry: Arc<Mutex<PeerState>>,
    links: mpsc::UnboundedReceiver<DuplexStream>,
}

impl LoopbackPeer {
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Wait for the next link opened to this peer and take its far end.
    pub async fn accept(&mut self) -> Option<DuplexStream> {
        self.links.recv().await
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.entry.lock().unwrap().name = Some(name.into());
    }

    pub fn set_rssi(&self, rssi: i16) {
        self.entry.lock().unwrap().rssi = rssi;
    }

    pub fn set_bonded(&self, bonded: bool) {
        self.entry.lock().unwrap().bonded = bonded;
    }

    /// Whether the peer answers inquiry scans.
    pub fn set_discoverable(&self, discoverable: bool) {
        self.entry.lock().unwrap().discoverable = discoverable;
    }

    /// Delay applied to every connection attempt before it resolves.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.entry.lock().unwrap().connect_delay = delay;
    }

    /// Make connection attempts fail with a refused error.
    pub fn set_refuse_connections(&self, refuse: bool) {
        self.entry.lock().unwrap().refuse_connections = refuse;
    }

    /// Make pairing attempts fail.
    pub fn set_fail_bonding(&self, fail: bool) {
        self.entry.lock().unwrap().fail_bonding = fail;
    }

    /// The security mode of the most recent connection attempt.
    pub fn last_security(&self) -> Option<Security> {
        self.entry.lock().unwrap().last_security
    }
}
