// ── Hardware scan operations ──
//
// Both scan flavours start a hardware scan during their radio phase and
// hand the radio back immediately; results keep flowing through the sink
// until the operation is stopped.

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use tracing::{debug, warn};

use crate::error::ScanError;
use crate::model::{FilterKey, RawScanResult, ScanFilter, ScanMode, ScanSettings};
use crate::platform::{AdapterWrapper, ScanSink, ScanSinkId};
use crate::queue::{Emitter, OperationFuture, RadioOperation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Stopped,
}

/// Start/stop bookkeeping shared by the scan operations.
///
/// The phase lock is held across the platform start call so a concurrent
/// `stop` can never slip in between "started" and "recorded as started".
/// It is private to one operation and never shared with the queue.
struct HardwareScan {
    adapter: Arc<dyn AdapterWrapper>,
    mode: ScanMode,
    sink_id: ScanSinkId,
    phase: Mutex<Phase>,
}

impl HardwareScan {
    fn new(adapter: Arc<dyn AdapterWrapper>, mode: ScanMode) -> Self {
        Self {
            adapter,
            mode,
            sink_id: ScanSinkId::next(),
            phase: Mutex::new(Phase::Idle),
        }
    }

    fn start(
        &self,
        emitter: Emitter<RawScanResult>,
        matcher: impl Fn(&RawScanResult) -> bool + Send + Sync + 'static,
    ) -> Result<(), ScanError> {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *phase != Phase::Idle {
            return Err(ScanError::cannot_start("scan operation was already used"));
        }

        let sink = ScanSink::new(self.sink_id, emitter, matcher);
        match self.adapter.start_scan(self.mode, sink) {
            Ok(()) => {
                *phase = Phase::Running;
                debug!(sink = %self.sink_id, mode = %self.mode, "hardware scan started");
                Ok(())
            }
            Err(err) => {
                *phase = Phase::Stopped;
                warn!(sink = %self.sink_id, error = %err, "hardware scan failed to start");
                Err(err)
            }
        }
    }

    fn stop(&self) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *phase, Phase::Stopped);
        if previous == Phase::Running {
            self.adapter.stop_scan(self.sink_id);
            debug!(sink = %self.sink_id, "hardware scan stopped");
        }
    }

    fn is_running(&self) -> bool {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) == Phase::Running
    }
}

// ── LegacyScanOperation ──────────────────────────────────────────

/// Scan backing the deduplicated entry point. Forwards advertisements
/// carrying every service identifier of its key.
pub struct LegacyScanOperation {
    key: FilterKey,
    hardware: HardwareScan,
}

impl LegacyScanOperation {
    pub fn new(key: FilterKey, adapter: Arc<dyn AdapterWrapper>) -> Self {
        Self {
            key,
            hardware: HardwareScan::new(adapter, ScanMode::default()),
        }
    }

    pub fn key(&self) -> &FilterKey {
        &self.key
    }

    pub fn is_running(&self) -> bool {
        self.hardware.is_running()
    }
}

impl RadioOperation for LegacyScanOperation {
    type Item = RawScanResult;

    fn name(&self) -> &'static str {
        "legacy-scan"
    }

    fn run(&self, emitter: Emitter<RawScanResult>) -> OperationFuture {
        let key = self.key.clone();
        let started = self
            .hardware
            .start(emitter, move |result| key.matches(result));
        futures_util::future::ready(started).boxed()
    }

    fn stop(&self) {
        self.hardware.stop();
    }
}

// ── FilteredScanOperation ────────────────────────────────────────

/// Scan backing the settings-based entry point. Forwards advertisements
/// matching any of its filters.
pub struct FilteredScanOperation {
    filters: Arc<[ScanFilter]>,
    hardware: HardwareScan,
}

impl FilteredScanOperation {
    pub fn new(
        settings: &ScanSettings,
        filters: Vec<ScanFilter>,
        adapter: Arc<dyn AdapterWrapper>,
    ) -> Self {
        Self {
            filters: filters.into(),
            hardware: HardwareScan::new(adapter, settings.scan_mode),
        }
    }

    pub fn is_running(&self) -> bool {
        self.hardware.is_running()
    }
}

impl RadioOperation for FilteredScanOperation {
    type Item = RawScanResult;

    fn name(&self) -> &'static str {
        "filtered-scan"
    }

    fn run(&self, emitter: Emitter<RawScanResult>) -> OperationFuture {
        let filters = Arc::clone(&self.filters);
        let started = self
            .hardware
            .start(emitter, move |result| ScanFilter::any_matches(&filters, result));
        futures_util::future::ready(started).boxed()
    }

    fn stop(&self) {
        self.hardware.stop();
    }
}
