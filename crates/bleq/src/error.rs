//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use bleq_config::ConfigError;
use bleq_core::{CoreError, ScanError};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const RADIO_OFF: i32 = 3;
    pub const UNAVAILABLE: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONFLICT: i32 = 6;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Radio ────────────────────────────────────────────────────────
    #[error("{reason}")]
    #[diagnostic(
        code(bleq::radio_off),
        help("Turn the adapter on and run the scan again.")
    )]
    RadioOff { reason: ScanError },

    #[error("No Bluetooth adapter is available")]
    #[diagnostic(code(bleq::no_adapter))]
    NoAdapter,

    #[error("Scanning requires location access: {reason}")]
    #[diagnostic(
        code(bleq::location),
        help("Grant the location permission and enable location services,\n\
              or set `location_gated = false` in your profile.")
    )]
    Location { reason: ScanError },

    #[error("Scan could not be started: {message}")]
    #[diagnostic(code(bleq::scan_failed))]
    ScanFailed { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(bleq::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(bleq::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(code(bleq::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(bleq::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    #[diagnostic(code(bleq::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::RadioOff { .. } => exit_code::RADIO_OFF,
            Self::NoAdapter => exit_code::UNAVAILABLE,
            Self::Location { .. } => exit_code::PERMISSION,
            Self::ConfigExists { .. } => exit_code::CONFLICT,
            Self::ProfileNotFound { .. } | Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ScanError> for CliError {
    fn from(err: ScanError) -> Self {
        match err {
            reason @ (ScanError::AdapterDisabled | ScanError::BluetoothDisabled) => {
                Self::RadioOff { reason }
            }
            ScanError::AdapterUnavailable => Self::NoAdapter,
            reason @ (ScanError::PermissionMissing | ScanError::LocationServicesDisabled) => {
                Self::Location { reason }
            }
            ScanError::CannotStart { message } => Self::ScanFailed { message },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AdapterMissing => Self::NoAdapter,
            CoreError::Scan(scan) => scan.into(),
            CoreError::QueueClosed => Self::ScanFailed {
                message: CoreError::QueueClosed.to_string(),
            },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_errors_map_to_distinct_exit_codes() {
        let cases = [
            (ScanError::BluetoothDisabled, exit_code::RADIO_OFF),
            (ScanError::AdapterDisabled, exit_code::RADIO_OFF),
            (ScanError::AdapterUnavailable, exit_code::UNAVAILABLE),
            (ScanError::PermissionMissing, exit_code::PERMISSION),
            (ScanError::LocationServicesDisabled, exit_code::PERMISSION),
            (
                ScanError::CannotStart {
                    message: "busy".into(),
                },
                exit_code::GENERAL,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(CliError::from(err.clone()).exit_code(), code, "{err}");
        }
    }

    #[test]
    fn missing_adapter_matches_unavailable_scan() {
        assert_eq!(
            CliError::from(CoreError::AdapterMissing).exit_code(),
            exit_code::UNAVAILABLE
        );
    }
}
