// ── Shared scans ──
//
// One `SharedScan` per registry entry. A single pump task owns the queued
// scan operation and fans its results out to every observer over a
// broadcast channel. The pump also watches the adapter-off alarm, so all
// observers see the same terminal error and the hardware scan is stopped
// exactly once.

use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ScanError;
use crate::model::{FilterKey, RawScanResult, ScanResult};
use crate::platform::DeviceProvider;
use crate::queue::OperationStream;
use crate::registry::{ScanId, ScanRequestRegistry, SharedResource};

/// Item delivered on public scan streams.
pub type ScanItem = Result<ScanResult, ScanError>;

/// Callback run by the pump when the scan ends on its own.
pub(crate) type TerminalHook = Box<dyn FnOnce() + Send>;

/// Stops the underlying operation in place. Must be idempotent.
pub(crate) type StopHook = Arc<dyn Fn() + Send + Sync>;

/// Everything the pump task needs, parked until the first observer polls.
struct Pump {
    source: OperationStream<RawScanResult>,
    alarm: BoxFuture<'static, ScanError>,
    devices: Arc<dyn DeviceProvider>,
    tx: broadcast::Sender<ScanItem>,
    on_terminal: TerminalHook,
}

enum PumpExit {
    TornDown,
    Completed,
    Failed(ScanError),
}

impl Pump {
    async fn run(self, cancel: CancellationToken, key: FilterKey, id: ScanId) {
        let Self {
            mut source,
            mut alarm,
            devices,
            tx,
            on_terminal,
        } = self;
        debug!(%key, %id, "shared scan pump started");

        let exit = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break PumpExit::TornDown,
                err = &mut alarm => break PumpExit::Failed(err),
                item = source.next() => match item {
                    Some(Ok(raw)) => {
                        let device = devices.resolve(&raw.address);
                        // Lagging observers skip items; the pump never waits.
                        let _ = tx.send(Ok(ScanResult::from_raw(device, raw)));
                    }
                    Some(Err(err)) => break PumpExit::Failed(err),
                    None => break PumpExit::Completed,
                },
            }
        };

        match exit {
            PumpExit::TornDown => debug!(%key, %id, "shared scan torn down"),
            PumpExit::Completed => {
                debug!(%key, %id, "shared scan completed");
                on_terminal();
            }
            PumpExit::Failed(err) => {
                warn!(%key, %id, error = %err, "shared scan failed");
                // Evict first so new subscribers start a fresh scan instead
                // of joining this one.
                on_terminal();
                let _ = tx.send(Err(err));
            }
        }

        // Dropping the source cancels the queue slot, which stops the
        // operation on the queue side.
        drop(source);
    }
}

// ── SharedScan ───────────────────────────────────────────────────

/// Multicast wrapper around one queued scan operation.
pub struct SharedScan {
    id: ScanId,
    key: FilterKey,
    template: Mutex<broadcast::Receiver<ScanItem>>,
    pump: Mutex<Option<Pump>>,
    stop_now: StopHook,
    cancel: CancellationToken,
}

impl SharedScan {
    pub(crate) fn new(
        id: ScanId,
        key: FilterKey,
        source: OperationStream<RawScanResult>,
        alarm: BoxFuture<'static, ScanError>,
        devices: Arc<dyn DeviceProvider>,
        capacity: usize,
        on_terminal: TerminalHook,
        stop_now: StopHook,
    ) -> Self {
        let (tx, template) = broadcast::channel(capacity.max(1));
        Self {
            id,
            key,
            template: Mutex::new(template),
            pump: Mutex::new(Some(Pump {
                source,
                alarm,
                devices,
                tx,
                on_terminal,
            })),
            stop_now,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> ScanId {
        self.id
    }

    pub fn key(&self) -> &FilterKey {
        &self.key
    }

    pub fn is_started(&self) -> bool {
        self.pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Spawn the pump on first use. Later calls are no-ops.
    fn ensure_started(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        let pump = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pump) = pump {
            tokio::spawn(pump.run(self.cancel.clone(), self.key.clone(), self.id));
        }
    }
}

impl SharedResource for SharedScan {
    type Observer = broadcast::Receiver<ScanItem>;

    fn observe(&self) -> Self::Observer {
        self.template
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .resubscribe()
    }

    fn teardown(&self) {
        self.cancel.cancel();
        let parked = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match parked {
            // Never started: the source was never submitted, so dropping it
            // is enough.
            Some(pump) => drop(pump),
            // The hardware scan stops before the release returns. The pump
            // still drops its source afterwards, which frees the queue slot.
            None => (self.stop_now)(),
        }
    }
}

impl std::fmt::Debug for SharedScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedScan")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

// ── ScanSubscription ─────────────────────────────────────────────

/// One observer of a [`SharedScan`].
///
/// The scan starts when the first subscription is polled. Dropping the
/// subscription releases it from the registry.
pub struct ScanSubscription {
    shared: Arc<SharedScan>,
    registry: Arc<ScanRequestRegistry<SharedScan>>,
    inner: BroadcastStream<ScanItem>,
    polled: bool,
    finished: bool,
}

impl ScanSubscription {
    pub(crate) fn join(
        registry: &Arc<ScanRequestRegistry<SharedScan>>,
        key: &FilterKey,
        factory: impl FnOnce(ScanId) -> SharedScan,
    ) -> Self {
        let (_, shared, rx) = registry.get_or_create(key, factory);
        Self {
            shared,
            registry: Arc::clone(registry),
            inner: BroadcastStream::new(rx),
            polled: false,
            finished: false,
        }
    }

    pub fn scan_id(&self) -> ScanId {
        self.shared.id()
    }
}

impl Stream for ScanSubscription {
    type Item = ScanItem;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        if !this.polled {
            this.polled = true;
            this.shared.ensure_started();
        }

        loop {
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(item))) => {
                    if item.is_err() {
                        this.finished = true;
                    }
                    return Poll::Ready(Some(item));
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(key = %this.shared.key(), skipped, "scan observer lagged, results dropped");
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for ScanSubscription {
    fn drop(&mut self) {
        self.registry.release(self.shared.key(), self.shared.id());
    }
}

impl std::fmt::Debug for ScanSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSubscription")
            .field("shared", &self.shared)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
