// ── Client configuration ──

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Runtime knobs for a [`BleClient`](crate::BleClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Whether scanning is gated behind location permission and location
    /// services on this platform.
    pub location_gated: bool,
    /// Per-scan fan-out buffer. Observers falling further behind than this
    /// skip the missed results.
    pub broadcast_capacity: usize,
    /// Buffer of the adapter state notification channel.
    pub state_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            location_gated: true,
            broadcast_capacity: 256,
            state_channel_capacity: 16,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.broadcast_capacity == 0 {
            return Err(CoreError::Config {
                message: "broadcast_capacity must be greater than zero".into(),
            });
        }
        if self.state_channel_capacity == 0 {
            return Err(CoreError::Config {
                message: "state_channel_capacity must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.location_gated);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_capacities_are_rejected() {
        let config = ClientConfig {
            broadcast_capacity: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config { .. })));

        let config = ClientConfig {
            state_channel_capacity: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config { .. })));
    }
}
