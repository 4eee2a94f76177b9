// ── Scan results and settings ──

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::address::DeviceAddress;
use super::device::DeviceHandle;

/// One advertisement as reported by the platform, before device resolution.
///
/// The scan record is kept as opaque bytes; the platform layer supplies
/// the advertised service identifiers it already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawScanResult {
    pub address: DeviceAddress,
    pub name: Option<String>,
    pub rssi: i16,
    pub services: Vec<Uuid>,
    pub scan_record: Bytes,
}

/// Public scan result delivered to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub device: DeviceHandle,
    /// Local name from the advertisement, when present.
    pub name: Option<String>,
    pub rssi: i16,
    pub services: Vec<Uuid>,
    pub scan_record: Bytes,
    pub timestamp: DateTime<Utc>,
}

impl ScanResult {
    /// Pair a raw advertisement with its resolved device handle.
    pub fn from_raw(device: DeviceHandle, raw: RawScanResult) -> Self {
        Self {
            device,
            name: raw.name,
            rssi: raw.rssi,
            services: raw.services,
            scan_record: raw.scan_record,
            timestamp: Utc::now(),
        }
    }
}

/// Radio duty cycle requested from the platform.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    Opportunistic,
    #[default]
    LowPower,
    Balanced,
    LowLatency,
}

/// Settings for the non-deduplicated scan entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSettings {
    pub scan_mode: ScanMode,
}

impl ScanSettings {
    pub fn with_mode(scan_mode: ScanMode) -> Self {
        Self { scan_mode }
    }
}
