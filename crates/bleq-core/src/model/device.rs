// ── Device handles ──

use std::sync::Arc;

use serde::Serialize;

use super::address::DeviceAddress;

/// A remote device known to the client.
///
/// Connection and attribute access are layered on top of this handle by
/// other crates; the scheduler only needs identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Device {
    pub address: DeviceAddress,
}

impl Device {
    pub fn new(address: DeviceAddress) -> Self {
        Self { address }
    }
}

/// Shared handle to a [`Device`]. The device provider hands out the same
/// `Arc` for the same address.
pub type DeviceHandle = Arc<Device>;
