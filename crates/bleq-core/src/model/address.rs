// ── Hardware addresses ──

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bluetooth hardware address, normalized to upper-case colon-separated
/// form (`AA:BB:CC:DD:EE:FF`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Create a normalized address from any common format.
    /// Accepts colon-separated, dash-separated, or bare hex.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let cleaned: String = raw
            .as_ref()
            .chars()
            .filter(char::is_ascii_hexdigit)
            .map(|c| c.to_ascii_uppercase())
            .collect();

        // Anything that is not 12 hex digits is kept as given (upper-cased)
        // so platform-specific identifiers still round-trip.
        if cleaned.len() != 12 {
            return Self(raw.as_ref().to_uppercase().replace('-', ":"));
        }

        let octets: Vec<&str> = (0..6).filter_map(|i| cleaned.get(i * 2..i * 2 + 2)).collect();
        Self(octets.join(":"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for DeviceAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators_and_case() {
        let expected = "AA:BB:CC:DD:EE:FF";
        assert_eq!(DeviceAddress::new("aa:bb:cc:dd:ee:ff").as_str(), expected);
        assert_eq!(DeviceAddress::new("AA-BB-CC-DD-EE-FF").as_str(), expected);
        assert_eq!(DeviceAddress::new("aabbccddeeff").as_str(), expected);
    }

    #[test]
    fn keeps_non_mac_identifiers() {
        assert_eq!(DeviceAddress::new("sim-1").as_str(), "SIM:1");
    }

    #[test]
    fn equal_after_normalization() {
        assert_eq!(
            DeviceAddress::new("01:02:03:04:05:0a"),
            DeviceAddress::new("01-02-03-04-05-0A")
        );
    }
}
