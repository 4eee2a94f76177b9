// ── Scan preconditions ──

use std::sync::Arc;

use tracing::debug;

use crate::error::ScanError;
use crate::platform::{AdapterWrapper, LocationStatus};

/// Ordered checks run before every scan subscription.
///
/// Nothing is cached: environmental state can change between calls.
#[derive(Clone)]
pub struct PreconditionGate {
    adapter: Arc<dyn AdapterWrapper>,
    location: Arc<dyn LocationStatus>,
    location_gated: bool,
}

impl PreconditionGate {
    pub fn new(
        adapter: Arc<dyn AdapterWrapper>,
        location: Arc<dyn LocationStatus>,
        location_gated: bool,
    ) -> Self {
        Self {
            adapter,
            location,
            location_gated,
        }
    }

    /// Return the first failing precondition, checked in this order:
    /// adapter present, adapter enabled, location permission, location
    /// services. Location checks are skipped on ungated platforms.
    pub fn verify(&self) -> Result<(), ScanError> {
        let result = self.check();
        if let Err(ref err) = result {
            debug!(reason = %err.reason(), "scan precondition failed");
        }
        result
    }

    fn check(&self) -> Result<(), ScanError> {
        if !self.adapter.has_adapter() {
            return Err(ScanError::AdapterUnavailable);
        }
        if !self.adapter.is_enabled() {
            return Err(ScanError::AdapterDisabled);
        }
        if self.location_gated {
            if !self.location.permission_granted() {
                return Err(ScanError::PermissionMissing);
            }
            if !self.location.service_enabled() {
                return Err(ScanError::LocationServicesDisabled);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PreconditionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreconditionGate")
            .field("location_gated", &self.location_gated)
            .finish_non_exhaustive()
    }
}

/// Location status for platforms without location gating.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationUnrestricted;

impl LocationStatus for LocationUnrestricted {
    fn permission_granted(&self) -> bool {
        true
    }

    fn service_enabled(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAdapter, FakeLocationStatus};

    fn gate(adapter: &Arc<FakeAdapter>, location: &Arc<FakeLocationStatus>) -> PreconditionGate {
        PreconditionGate::new(adapter.clone(), location.clone(), true)
    }

    #[test]
    fn all_preconditions_met() {
        let adapter = Arc::new(FakeAdapter::new());
        let location = Arc::new(FakeLocationStatus::granted());
        assert_eq!(gate(&adapter, &location).verify(), Ok(()));
    }

    #[test]
    fn missing_adapter_wins_over_everything() {
        let adapter = Arc::new(FakeAdapter::absent());
        adapter.set_enabled(false);
        let location = Arc::new(FakeLocationStatus::granted());
        location.set_permission(false);
        location.set_service(false);

        assert_eq!(
            gate(&adapter, &location).verify(),
            Err(ScanError::AdapterUnavailable)
        );
    }

    #[test]
    fn checks_run_in_order() {
        let adapter = Arc::new(FakeAdapter::new());
        let location = Arc::new(FakeLocationStatus::granted());
        let gate = gate(&adapter, &location);

        location.set_permission(false);
        location.set_service(false);
        assert_eq!(gate.verify(), Err(ScanError::PermissionMissing));

        location.set_permission(true);
        assert_eq!(gate.verify(), Err(ScanError::LocationServicesDisabled));

        adapter.set_enabled(false);
        assert_eq!(gate.verify(), Err(ScanError::AdapterDisabled));
    }

    #[test]
    fn result_is_never_cached() {
        let adapter = Arc::new(FakeAdapter::new());
        let location = Arc::new(FakeLocationStatus::granted());
        let gate = gate(&adapter, &location);

        adapter.set_enabled(false);
        assert!(gate.verify().is_err());
        adapter.set_enabled(true);
        assert!(gate.verify().is_ok());
    }

    #[test]
    fn ungated_platform_skips_location_checks() {
        let adapter = Arc::new(FakeAdapter::new());
        let location = Arc::new(FakeLocationStatus::granted());
        location.set_permission(false);
        let gate = PreconditionGate::new(adapter, location, false);

        assert_eq!(gate.verify(), Ok(()));
    }
}
