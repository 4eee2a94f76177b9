// ── Platform collaborators ──
//
// The core never talks to a radio stack directly. Platform glue implements
// these traits; the core consumes them through `Arc<dyn ...>`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::error::ScanError;
use crate::model::{Device, DeviceAddress, DeviceHandle, RawScanResult, ScanMode};
use crate::queue::Emitter;

/// Hardware adapter access.
pub trait AdapterWrapper: Send + Sync + 'static {
    fn has_adapter(&self) -> bool;

    fn is_enabled(&self) -> bool;

    fn bonded_devices(&self) -> Vec<DeviceAddress>;

    /// Start a hardware scan delivering every advertisement into `sink`.
    /// The adapter keeps the sink until [`stop_scan`](Self::stop_scan) is
    /// called with its id.
    fn start_scan(&self, mode: ScanMode, sink: ScanSink) -> Result<(), ScanError>;

    fn stop_scan(&self, id: ScanSinkId);
}

/// Location permission and service status, on platforms that gate
/// scanning behind location.
pub trait LocationStatus: Send + Sync + 'static {
    fn permission_granted(&self) -> bool;

    fn service_enabled(&self) -> bool;
}

/// Maps a hardware address to a device handle.
///
/// Must be idempotent: the same address always yields a handle for the
/// same logical device.
pub trait DeviceProvider: Send + Sync + 'static {
    fn resolve(&self, address: &DeviceAddress) -> DeviceHandle;
}

// ── ScanSink ─────────────────────────────────────────────────────

/// Identifies one started hardware scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanSinkId(u64);

impl ScanSinkId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ScanSinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scan-{}", self.0)
    }
}

type Matcher = Arc<dyn Fn(&RawScanResult) -> bool + Send + Sync>;

/// Callback target handed to [`AdapterWrapper::start_scan`].
///
/// Applies the operation's filter before forwarding, so platforms can
/// deliver every advertisement they see.
#[derive(Clone)]
pub struct ScanSink {
    id: ScanSinkId,
    emitter: Emitter<RawScanResult>,
    matcher: Matcher,
}

impl ScanSink {
    pub(crate) fn new(
        id: ScanSinkId,
        emitter: Emitter<RawScanResult>,
        matcher: impl Fn(&RawScanResult) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            emitter,
            matcher: Arc::new(matcher),
        }
    }

    pub fn id(&self) -> ScanSinkId {
        self.id
    }

    /// Forward an advertisement. Returns `false` once nobody is listening,
    /// which platforms may use to drop the sink early.
    pub fn deliver(&self, result: RawScanResult) -> bool {
        if !(self.matcher)(&result) {
            return !self.emitter.is_closed();
        }
        self.emitter.next(result)
    }

    /// Report that the platform aborted the scan.
    pub fn fail(&self, err: ScanError) -> bool {
        self.emitter.fail(err)
    }
}

impl fmt::Debug for ScanSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanSink")
            .field("id", &self.id)
            .field("emitter", &self.emitter)
            .finish_non_exhaustive()
    }
}

// ── CachingDeviceProvider ────────────────────────────────────────

/// Default [`DeviceProvider`]: one shared handle per normalized address.
#[derive(Debug, Default)]
pub struct CachingDeviceProvider {
    devices: DashMap<DeviceAddress, DeviceHandle>,
}

impl CachingDeviceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl DeviceProvider for CachingDeviceProvider {
    fn resolve(&self, address: &DeviceAddress) -> DeviceHandle {
        self.devices
            .entry(address.clone())
            .or_insert_with(|| Arc::new(Device::new(address.clone())))
            .value()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_is_idempotent() {
        let provider = CachingDeviceProvider::new();
        let a = provider.resolve(&DeviceAddress::new("aa:bb:cc:dd:ee:ff"));
        let b = provider.resolve(&DeviceAddress::new("AA-BB-CC-DD-EE-FF"));

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(provider.len(), 1);
    }

    #[test]
    fn distinct_addresses_get_distinct_handles() {
        let provider = CachingDeviceProvider::new();
        let a = provider.resolve(&DeviceAddress::new("00:00:00:00:00:01"));
        let b = provider.resolve(&DeviceAddress::new("00:00:00:00:00:02"));

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.address.as_str(), "00:00:00:00:00:01");
    }

    #[test]
    fn sink_ids_are_unique() {
        assert_ne!(ScanSinkId::next(), ScanSinkId::next());
    }
}
