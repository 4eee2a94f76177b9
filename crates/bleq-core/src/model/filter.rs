// ── Scan filters ──
//
// `FilterKey` identifies a logical deduplicated scan; `ScanFilter` is the
// per-call predicate used by the settings-based scan entry point.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::address::DeviceAddress;
use super::scan::RawScanResult;

/// Normalized, order-irrelevant set of service identifiers.
///
/// Backed by a sorted set, so `{A, B}` and `{B, A, A}` produce equal keys
/// with equal hashes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FilterKey(BTreeSet<Uuid>);

impl FilterKey {
    pub fn new(ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self(ids.into_iter().collect())
    }

    /// An empty key matches every advertisement.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Uuid> {
        self.0.iter()
    }

    /// `true` when every identifier of the key is advertised by `result`.
    pub fn matches(&self, result: &RawScanResult) -> bool {
        self.0.iter().all(|id| result.services.contains(id))
    }
}

impl FromIterator<Uuid> for FilterKey {
    fn from_iter<I: IntoIterator<Item = Uuid>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("{*}");
        }
        let ids: Vec<String> = self.0.iter().map(Uuid::to_string).collect();
        write!(f, "{{{}}}", ids.join(","))
    }
}

/// Predicate for the settings-based scan path. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFilter {
    pub service_uuid: Option<Uuid>,
    pub device_address: Option<DeviceAddress>,
    pub device_name: Option<String>,
}

impl ScanFilter {
    pub fn by_service(uuid: Uuid) -> Self {
        Self {
            service_uuid: Some(uuid),
            ..Self::default()
        }
    }

    pub fn by_address(address: DeviceAddress) -> Self {
        Self {
            device_address: Some(address),
            ..Self::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, result: &RawScanResult) -> bool {
        let service_ok = self
            .service_uuid
            .is_none_or(|id| result.services.contains(&id));
        let address_ok = self
            .device_address
            .as_ref()
            .is_none_or(|addr| *addr == result.address);
        let name_ok = self
            .device_name
            .as_ref()
            .is_none_or(|name| result.name.as_ref() == Some(name));
        service_ok && address_ok && name_ok
    }

    /// A result passes a filter list if any filter matches; an empty list
    /// passes everything.
    pub fn any_matches(filters: &[ScanFilter], result: &RawScanResult) -> bool {
        filters.is_empty() || filters.iter().any(|f| f.matches(result))
    }
}
