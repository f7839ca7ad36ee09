//! Session management for classic Bluetooth serial (SPP) links.
//!
//! This crate is the native core behind a serial-port bridge: it owns
//! device discovery and pairing, the lifecycle of a single RFCOMM-style
//! connection, and the buffered byte stream flowing through it, with
//! delimiter framing on the receive side. The platform radio sits behind
//! the [`platform::Adapter`] trait; [`loopback`] provides an in-process
//! backend for tests and demos.
//!
//! ```no_run
//! use btserial::loopback::LoopbackAdapter;
//! use btserial::{Security, SessionManager};
//!
//! # async fn demo() -> btserial::Result<()> {
//! let adapter = LoopbackAdapter::new();
//! let peer = adapter.add_peer("00:11:22:33:44:55".parse()?);
//! peer.set_name("gps-mouse");
//!
//! let session = SessionManager::new(adapter.clone());
//! session.connect(peer.address(), Security::Secure).await?;
//! session.write(b"$GPGGA?\r\n").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod loopback;
pub mod platform;
pub mod session;
pub mod types;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use session::{DiscoveryStream, SessionManager, SubscriptionStream};
pub use types::{Address, ConnectionState, Device, Security};
