//! Radio operation scheduling and deduplicated BLE scans.
//!
//! `bleq-core` serializes every low-level radio command through a single
//! FIFO queue and lets concurrent callers share one hardware scan per set
//! of service identifiers. The pieces, leaves first:
//!
//! - [`RadioQueue`]: runs [`RadioOperation`]s one at a time and hands back a
//!   lazy [`OperationStream`] per operation.
//! - [`PreconditionGate`]: ordered environment checks run before every scan.
//! - [`AdapterStateWatcher`]: adapter power transitions, consumed by scans
//!   as a one-shot "radio went off" alarm.
//! - [`ScanRequestRegistry`]: reference-counted table of shared scans keyed
//!   by [`FilterKey`].
//! - [`SharedScan`]: fans one hardware scan out to every observer.
//! - [`BleClient`]: the facade callers use.
//!
//! Platform access goes through the [`AdapterWrapper`], [`LocationStatus`]
//! and [`DeviceProvider`] traits.

pub mod client;
pub mod config;
pub mod error;
pub mod gate;
pub mod model;
pub mod operation;
pub mod platform;
pub mod queue;
pub mod registry;
pub mod shared;
pub mod watcher;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

// ── Primary re-exports ──────────────────────────────────────────

pub use client::{BleClient, BleClientBuilder, ScanStream};
pub use config::ClientConfig;
pub use error::{CoreError, ScanError, ScanFailureReason};
pub use gate::{LocationUnrestricted, PreconditionGate};
pub use operation::{FilteredScanOperation, LegacyScanOperation};
pub use platform::{
    AdapterWrapper, CachingDeviceProvider, DeviceProvider, LocationStatus, ScanSink, ScanSinkId,
};
pub use queue::{Emitter, OperationFuture, OperationStream, RadioOperation, RadioQueue};
pub use registry::{ScanId, ScanRequestRegistry, SharedResource};
pub use shared::{ScanItem, ScanSubscription, SharedScan};
pub use watcher::{AdapterStateStream, AdapterStateWatcher};

// Model types
pub use model::{
    AdapterState, Device, DeviceAddress, DeviceHandle, FilterKey, RawScanResult, ScanFilter,
    ScanMode, ScanResult, ScanSettings,
};

pub use uuid::Uuid;
