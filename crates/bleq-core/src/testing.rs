// ── Test doubles ──
//
// In-memory collaborators for exercising the scheduler without a radio.
// Available to downstream crates through the `test-support` feature.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::ScanError;
use crate::model::{DeviceAddress, RawScanResult, ScanMode};
use crate::platform::{AdapterWrapper, LocationStatus, ScanSink, ScanSinkId};
use crate::queue::Emitter;

/// Build an advertisement carrying `services`.
pub fn advertisement(address: &str, services: &[Uuid]) -> RawScanResult {
    RawScanResult {
        address: DeviceAddress::new(address),
        name: None,
        rssi: -55,
        services: services.to_vec(),
        scan_record: Bytes::from_static(&[0x02, 0x01, 0x06]),
    }
}

/// Detached emitter for driving an operation by hand.
pub fn emitter<T>() -> (Emitter<T>, mpsc::UnboundedReceiver<Result<T, ScanError>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Emitter::new(tx), rx)
}

// ── FakeAdapter ──────────────────────────────────────────────────

/// Scriptable adapter that records start/stop calls and lets tests inject
/// advertisements into every active scan.
#[derive(Debug)]
pub struct FakeAdapter {
    present: AtomicBool,
    enabled: AtomicBool,
    refuse_start: AtomicBool,
    bonded: Mutex<Vec<DeviceAddress>>,
    sinks: Mutex<BTreeMap<ScanSinkId, ScanSink>>,
    last_mode: Mutex<Option<ScanMode>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl Default for FakeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAdapter {
    /// Present and enabled.
    pub fn new() -> Self {
        Self {
            present: AtomicBool::new(true),
            enabled: AtomicBool::new(true),
            refuse_start: AtomicBool::new(false),
            bonded: Mutex::new(Vec::new()),
            sinks: Mutex::new(BTreeMap::new()),
            last_mode: Mutex::new(None),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    /// No adapter on the system.
    pub fn absent() -> Self {
        let adapter = Self::new();
        adapter.set_present(false);
        adapter
    }

    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Make subsequent `start_scan` calls fail.
    pub fn refuse_starts(&self, refuse: bool) {
        self.refuse_start.store(refuse, Ordering::SeqCst);
    }

    pub fn add_bonded(&self, address: impl Into<DeviceAddress>) {
        self.bonded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(address.into());
    }

    /// Deliver `result` to every active scan. Returns how many scans are
    /// still listening.
    pub fn advertise(&self, result: &RawScanResult) -> usize {
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|sink| sink.deliver(result.clone()))
            .count()
    }

    /// Abort every active scan with `err`, as a platform callback would.
    pub fn fail_scans(&self, err: &ScanError) {
        for sink in self
            .sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
        {
            sink.fail(err.clone());
        }
    }

    pub fn active_scans(&self) -> usize {
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn last_mode(&self) -> Option<ScanMode> {
        *self.last_mode.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until at least `n` hardware scans have been started.
    pub async fn wait_for_starts(&self, n: usize) {
        while self.start_count() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Wait until at least `n` hardware scans have been stopped.
    pub async fn wait_for_stops(&self, n: usize) {
        while self.stop_count() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

impl AdapterWrapper for FakeAdapter {
    fn has_adapter(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }

    fn is_enabled(&self) -> bool {
        self.has_adapter() && self.enabled.load(Ordering::SeqCst)
    }

    fn bonded_devices(&self) -> Vec<DeviceAddress> {
        self.bonded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn start_scan(&self, mode: ScanMode, sink: ScanSink) -> Result<(), ScanError> {
        if self.refuse_start.load(Ordering::SeqCst) {
            return Err(ScanError::cannot_start("adapter refused to start scan"));
        }
        *self.last_mode.lock().unwrap_or_else(PoisonError::into_inner) = Some(mode);
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(sink.id(), sink);
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop_scan(&self, id: ScanSinkId) {
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

// ── FakeLocationStatus ───────────────────────────────────────────

#[derive(Debug)]
pub struct FakeLocationStatus {
    permission: AtomicBool,
    service: AtomicBool,
}

impl FakeLocationStatus {
    /// Permission granted and location services on.
    pub fn granted() -> Self {
        Self {
            permission: AtomicBool::new(true),
            service: AtomicBool::new(true),
        }
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission.store(granted, Ordering::SeqCst);
    }

    pub fn set_service(&self, enabled: bool) {
        self.service.store(enabled, Ordering::SeqCst);
    }
}

impl LocationStatus for FakeLocationStatus {
    fn permission_granted(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }

    fn service_enabled(&self) -> bool {
        self.service.load(Ordering::SeqCst)
    }
}
