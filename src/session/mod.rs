//! The session core: connection lifecycle, buffering, dispatch, and
//! device discovery, composed behind [`SessionManager`].

mod buffer;
mod connection;
mod dispatcher;
mod health;
mod manager;
mod registry;

pub use dispatcher::SubscriptionStream;
pub use manager::SessionManager;
pub use registry::DiscoveryStream;
