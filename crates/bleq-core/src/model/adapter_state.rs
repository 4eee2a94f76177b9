// ── Adapter power state ──

use serde::{Deserialize, Serialize};
use strum::Display;

/// Global on/off state of the hardware radio.
///
/// Only the ON vs. not-ON distinction matters to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AdapterState {
    On,
    Off,
    TurningOn,
    TurningOff,
    Unknown,
}

impl AdapterState {
    /// Platform state codes as broadcast by the system.
    pub const RAW_OFF: i32 = 10;
    pub const RAW_TURNING_ON: i32 = 11;
    pub const RAW_ON: i32 = 12;
    pub const RAW_TURNING_OFF: i32 = 13;

    /// Translate a raw platform notification code.
    pub fn from_raw(code: i32) -> Self {
        match code {
            Self::RAW_OFF => Self::Off,
            Self::RAW_TURNING_ON => Self::TurningOn,
            Self::RAW_ON => Self::On,
            Self::RAW_TURNING_OFF => Self::TurningOff,
            _ => Self::Unknown,
        }
    }

    pub fn is_usable(self) -> bool {
        matches!(self, Self::On)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_platform_codes() {
        assert_eq!(AdapterState::from_raw(10), AdapterState::Off);
        assert_eq!(AdapterState::from_raw(11), AdapterState::TurningOn);
        assert_eq!(AdapterState::from_raw(12), AdapterState::On);
        assert_eq!(AdapterState::from_raw(13), AdapterState::TurningOff);
        assert_eq!(AdapterState::from_raw(-1), AdapterState::Unknown);
    }

    #[test]
    fn only_on_is_usable() {
        assert!(AdapterState::On.is_usable());
        for state in [
            AdapterState::Off,
            AdapterState::TurningOn,
            AdapterState::TurningOff,
            AdapterState::Unknown,
        ] {
            assert!(!state.is_usable(), "{state} must not be usable");
        }
    }
}
