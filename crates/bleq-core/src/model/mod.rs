// ── Domain model ──
//
// Plain data types shared by the scheduler, the registry and callers.

pub mod adapter_state;
pub mod address;
pub mod device;
pub mod filter;
pub mod scan;

pub use adapter_state::AdapterState;
pub use address::DeviceAddress;
pub use device::{Device, DeviceHandle};
pub use filter::{FilterKey, ScanFilter};
pub use scan::{RawScanResult, ScanMode, ScanResult, ScanSettings};
