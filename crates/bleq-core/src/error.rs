// ── Core error types ──
//
// Two layers: `ScanError` is the operational taxonomy delivered on scan
// streams (cloned to every observer), `CoreError` covers everything a
// caller gets back from a direct method call.

use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Stable numeric reason codes reported alongside a [`ScanError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanFailureReason {
    CannotStart = 0,
    BluetoothDisabled = 1,
    BluetoothNotAvailable = 2,
    LocationPermissionMissing = 3,
    LocationServicesDisabled = 4,
}

impl ScanFailureReason {
    pub fn code(self) -> u8 {
        match self {
            Self::CannotStart => 0,
            Self::BluetoothDisabled => 1,
            Self::BluetoothNotAvailable => 2,
            Self::LocationPermissionMissing => 3,
            Self::LocationServicesDisabled => 4,
        }
    }
}

/// Operational scan failures.
///
/// These describe normal, expected environmental conditions. None of them
/// is retried inside the core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    // ── Precondition failures (raised before any radio work) ─────────
    #[error("Bluetooth adapter is not available on this system")]
    AdapterUnavailable,

    #[error("Bluetooth adapter is disabled")]
    AdapterDisabled,

    #[error("Location permission is required to scan")]
    PermissionMissing,

    #[error("Location services are disabled")]
    LocationServicesDisabled,

    // ── Mid-scan failures ────────────────────────────────────────────
    #[error("Bluetooth was disabled while scanning")]
    BluetoothDisabled,

    #[error("Scan could not be started: {message}")]
    CannotStart { message: String },
}

impl ScanError {
    pub fn reason(&self) -> ScanFailureReason {
        match self {
            Self::AdapterUnavailable => ScanFailureReason::BluetoothNotAvailable,
            Self::AdapterDisabled | Self::BluetoothDisabled => ScanFailureReason::BluetoothDisabled,
            Self::PermissionMissing => ScanFailureReason::LocationPermissionMissing,
            Self::LocationServicesDisabled => ScanFailureReason::LocationServicesDisabled,
            Self::CannotStart { .. } => ScanFailureReason::CannotStart,
        }
    }

    pub(crate) fn cannot_start(message: impl Into<String>) -> Self {
        Self::CannotStart {
            message: message.into(),
        }
    }
}

/// Unified error type for direct (non-stream) calls into the core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The caller asked for adapter-backed data on a system without an
    /// adapter. This is API misuse, not an environmental condition.
    #[error("bleq needs a Bluetooth adapter to be present on the system")]
    AdapterMissing,

    #[error("Radio queue is shut down")]
    QueueClosed,

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<CoreError> for ScanError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Scan(inner) => inner,
            CoreError::AdapterMissing => ScanError::AdapterUnavailable,
            other => ScanError::cannot_start(other.to_string()),
        }
    }
}
