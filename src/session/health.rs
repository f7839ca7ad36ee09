//! Signal-strength sampling for the live link.

use std::sync::Arc;

use log::debug;

use crate::error::Result;
use crate::platform::Adapter;
use crate::types::Address;

pub(crate) struct LinkHealthMonitor<A: Adapter> {
    adapter: Arc<A>,
}

impl<A: Adapter> LinkHealthMonitor<A> {
    pub fn new(adapter: Arc<A>) -> Self {
        LinkHealthMonitor { adapter }
    }

    /// Sample the signal strength of the link to `address`, in dBm.
    pub async fn read_rssi(&self, address: &Address) -> Result<i16> {
        let rssi = self.adapter.link_rssi(address).await?;
        debug!("RSSI for {address}: {rssi} dBm");
        Ok(rssi)
    }
}
