// ── BleClient ──
//
// Facade wiring the scheduler together: precondition gate, radio queue,
// scan registry and adapter state watcher behind one cloneable handle.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::{FutureExt, StreamExt};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::gate::{LocationUnrestricted, PreconditionGate};
use crate::model::{DeviceAddress, DeviceHandle, FilterKey, ScanFilter, ScanResult, ScanSettings};
use crate::operation::{FilteredScanOperation, LegacyScanOperation};
use crate::platform::{AdapterWrapper, CachingDeviceProvider, DeviceProvider, LocationStatus};
use crate::queue::{RadioOperation, RadioQueue};
use crate::registry::ScanRequestRegistry;
use crate::shared::{ScanItem, ScanSubscription, SharedScan, StopHook, TerminalHook};
use crate::watcher::{AdapterStateStream, AdapterStateWatcher};

// ── Builder ──────────────────────────────────────────────────────

/// Collects the platform collaborators for a [`BleClient`].
#[derive(Default)]
pub struct BleClientBuilder {
    config: ClientConfig,
    adapter: Option<Arc<dyn AdapterWrapper>>,
    location: Option<Arc<dyn LocationStatus>>,
    devices: Option<Arc<dyn DeviceProvider>>,
    watcher: Option<AdapterStateWatcher>,
}

impl BleClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn adapter(mut self, adapter: Arc<dyn AdapterWrapper>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Location status source. Defaults to "always granted".
    pub fn location(mut self, location: Arc<dyn LocationStatus>) -> Self {
        self.location = Some(location);
        self
    }

    /// Device resolution. Defaults to [`CachingDeviceProvider`].
    pub fn device_provider(mut self, devices: Arc<dyn DeviceProvider>) -> Self {
        self.devices = Some(devices);
        self
    }

    /// Share an existing watcher, e.g. one the platform glue already
    /// publishes into.
    pub fn state_watcher(mut self, watcher: AdapterStateWatcher) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Validate the configuration and start the radio queue worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<BleClient, CoreError> {
        self.config.validate()?;
        let adapter = self.adapter.ok_or_else(|| CoreError::Config {
            message: "an adapter wrapper is required".into(),
        })?;
        let location = self
            .location
            .unwrap_or_else(|| Arc::new(LocationUnrestricted));
        let devices = self
            .devices
            .unwrap_or_else(|| Arc::new(CachingDeviceProvider::new()));
        let watcher = self
            .watcher
            .unwrap_or_else(|| AdapterStateWatcher::new(self.config.state_channel_capacity));

        let gate = PreconditionGate::new(
            Arc::clone(&adapter),
            location,
            self.config.location_gated,
        );

        info!(
            location_gated = self.config.location_gated,
            broadcast_capacity = self.config.broadcast_capacity,
            "ble client started"
        );

        Ok(BleClient {
            inner: Arc::new(ClientInner {
                config: self.config,
                adapter,
                devices,
                gate,
                watcher,
                queue: RadioQueue::spawn(),
                registry: Arc::new(ScanRequestRegistry::new()),
            }),
        })
    }
}

// ── BleClient ────────────────────────────────────────────────────

/// Entry point for scanning and device lookup.
///
/// Cheaply cloneable; clones share one radio queue and one scan registry.
#[derive(Clone)]
pub struct BleClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    adapter: Arc<dyn AdapterWrapper>,
    devices: Arc<dyn DeviceProvider>,
    gate: PreconditionGate,
    watcher: AdapterStateWatcher,
    queue: RadioQueue,
    registry: Arc<ScanRequestRegistry<SharedScan>>,
}

impl BleClient {
    pub fn builder() -> BleClientBuilder {
        BleClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Deduplicated scan for advertisements carrying every id in
    /// `services`.
    ///
    /// Concurrent scans with the same set of ids share one hardware scan.
    /// Nothing happens until the stream is polled: preconditions are
    /// checked then, and a failure is the single item of the stream. The
    /// stream ends after the first error. Dropping it releases this
    /// observer; the hardware scan stops when the last observer is gone.
    pub fn scan(&self, services: impl IntoIterator<Item = Uuid>) -> ScanStream {
        let key: FilterKey = services.into_iter().collect();
        let inner = Arc::clone(&self.inner);

        ScanStream::new(async_stream::stream! {
            if let Err(err) = inner.gate.verify() {
                yield Err(err);
                return;
            }

            let mut subscription = inner.subscribe(&key);
            while let Some(item) = subscription.next().await {
                let terminal = item.is_err();
                yield item;
                if terminal {
                    break;
                }
            }
        })
    }

    /// Scan with explicit settings and filters. Every call gets its own
    /// hardware scan, and the adapter-off alarm is not attached.
    pub fn scan_with_settings(&self, settings: ScanSettings, filters: Vec<ScanFilter>) -> ScanStream {
        let inner = Arc::clone(&self.inner);

        ScanStream::new(async_stream::stream! {
            if let Err(err) = inner.gate.verify() {
                yield Err(err);
                return;
            }

            let op = Arc::new(FilteredScanOperation::new(
                &settings,
                filters,
                Arc::clone(&inner.adapter),
            ));
            let mut source = inner.queue.submit(op);
            while let Some(item) = source.next().await {
                match item {
                    Ok(raw) => {
                        let device = inner.devices.resolve(&raw.address);
                        yield Ok(ScanResult::from_raw(device, raw));
                    }
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        })
    }

    /// Handle for `address`. Fails when the system has no adapter.
    pub fn device(&self, address: &DeviceAddress) -> Result<DeviceHandle, CoreError> {
        self.require_adapter()?;
        Ok(self.inner.devices.resolve(address))
    }

    /// Handles for every bonded device. Fails when the system has no
    /// adapter.
    pub fn bonded_devices(&self) -> Result<Vec<DeviceHandle>, CoreError> {
        self.require_adapter()?;
        Ok(self
            .inner
            .adapter
            .bonded_devices()
            .iter()
            .map(|address| self.inner.devices.resolve(address))
            .collect())
    }

    /// Live adapter state transitions from now on.
    pub fn adapter_state_changes(&self) -> AdapterStateStream {
        self.inner.watcher.changes()
    }

    /// The watcher platform glue publishes adapter transitions into.
    pub fn state_watcher(&self) -> &AdapterStateWatcher {
        &self.inner.watcher
    }

    /// Number of distinct deduplicated scans currently registered.
    pub fn active_scan_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Observers currently sharing the deduplicated scan for `services`.
    pub fn observer_count(&self, services: impl IntoIterator<Item = Uuid>) -> usize {
        let key: FilterKey = services.into_iter().collect();
        self.inner.registry.observer_count(&key)
    }

    /// Stop the radio queue. Running scans are stopped and their streams
    /// end; later scans fail with `CannotStart`.
    pub async fn shutdown(&self) {
        self.inner.queue.shutdown().await;
        info!("ble client shut down");
    }

    fn require_adapter(&self) -> Result<(), CoreError> {
        if self.inner.adapter.has_adapter() {
            Ok(())
        } else {
            Err(CoreError::AdapterMissing)
        }
    }
}

impl ClientInner {
    /// Join (or create) the shared scan for `key`.
    fn subscribe(&self, key: &FilterKey) -> ScanSubscription {
        ScanSubscription::join(&self.registry, key, |id| {
            debug!(%key, %id, "submitting legacy scan");
            let op = Arc::new(LegacyScanOperation::new(
                key.clone(),
                Arc::clone(&self.adapter),
            ));
            let source = self.queue.submit(Arc::clone(&op));
            let stop_now: StopHook = Arc::new(move || op.stop());

            let registry = Arc::downgrade(&self.registry);
            let evict_key = key.clone();
            let on_terminal: TerminalHook = Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry.evict(&evict_key, id);
                }
            });

            SharedScan::new(
                id,
                key.clone(),
                source,
                self.watcher.off_alarm().boxed(),
                Arc::clone(&self.devices),
                self.config.broadcast_capacity,
                on_terminal,
                stop_now,
            )
        })
    }
}

impl fmt::Debug for BleClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BleClient")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

// ── ScanStream ───────────────────────────────────────────────────

/// Lazy stream of scan results returned by [`BleClient`].
pub struct ScanStream {
    inner: Pin<Box<dyn Stream<Item = ScanItem> + Send>>,
}

impl ScanStream {
    fn new(inner: impl Stream<Item = ScanItem> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(inner),
        }
    }
}

impl Stream for ScanStream {
    type Item = ScanItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for ScanStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanStream").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use crate::testing::{FakeAdapter, FakeLocationStatus};

    fn client(adapter: &Arc<FakeAdapter>) -> BleClient {
        BleClient::builder()
            .adapter(adapter.clone())
            .location(Arc::new(FakeLocationStatus::granted()))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn build_requires_an_adapter() {
        let err = BleClient::builder().build().unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[tokio::test]
    async fn build_rejects_invalid_config() {
        let err = BleClient::builder()
            .adapter(Arc::new(FakeAdapter::new()))
            .config(ClientConfig {
                broadcast_capacity: 0,
                ..ClientConfig::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[tokio::test]
    async fn device_lookup_requires_adapter() {
        let adapter = Arc::new(FakeAdapter::absent());
        let client = client(&adapter);

        let address = DeviceAddress::new("00:00:00:00:00:01");
        assert!(matches!(client.device(&address), Err(CoreError::AdapterMissing)));
        assert!(matches!(client.bonded_devices(), Err(CoreError::AdapterMissing)));
    }

    #[tokio::test]
    async fn device_handles_are_shared() {
        let adapter = Arc::new(FakeAdapter::new());
        adapter.add_bonded("00:00:00:00:00:0a");
        let client = client(&adapter);

        let bonded = client.bonded_devices().unwrap();
        let direct = client.device(&DeviceAddress::new("00-00-00-00-00-0A")).unwrap();

        assert_eq!(bonded.len(), 1);
        assert!(Arc::ptr_eq(&bonded[0], &direct));
    }

    #[tokio::test]
    async fn scan_is_lazy() {
        let adapter = Arc::new(FakeAdapter::new());
        let client = client(&adapter);

        let stream = client.scan([Uuid::from_u128(1)]);
        tokio::task::yield_now().await;
        assert_eq!(client.active_scan_count(), 0);
        drop(stream);
        assert_eq!(adapter.start_count(), 0);
    }

    #[tokio::test]
    async fn precondition_failure_is_the_only_item() {
        let adapter = Arc::new(FakeAdapter::new());
        adapter.set_enabled(false);
        let client = client(&adapter);

        let items: Vec<_> = client.scan([]).collect().await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap_err(), &ScanError::AdapterDisabled);
        assert_eq!(adapter.start_count(), 0);
        assert_eq!(client.active_scan_count(), 0);
    }
}
