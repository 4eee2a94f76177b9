//! Simulated radio backing the CLI.
//!
//! Implements the platform traits with a handful of fake peripherals that
//! advertise on a fixed interval. Each started hardware scan gets its own
//! tokio task, cancelled through a per-scan token on `stop_scan`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::{BufMut, BytesMut};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use bleq_config::SimulatorSettings;
use bleq_core::{
    AdapterState, AdapterStateWatcher, AdapterWrapper, DeviceAddress, LocationStatus,
    RawScanResult, ScanError, ScanMode, ScanSink, ScanSinkId, Uuid,
};

/// Bluetooth SIG base UUID; 16-bit assigned numbers live in bits 96..112.
const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

const HEART_RATE: u16 = 0x180D;
const BATTERY: u16 = 0x180F;
const ENVIRONMENTAL_SENSING: u16 = 0x181A;

const PRIMARY_SERVICES: [u16; 3] = [HEART_RATE, ENVIRONMENTAL_SENSING, BATTERY];

/// Expand a 16-bit assigned number to its full UUID.
pub fn service_uuid(short: u16) -> Uuid {
    Uuid::from_u128(BASE_UUID | (u128::from(short) << 96))
}

/// The 16-bit form of `uuid` when it sits on the SIG base.
pub fn short_service(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    let short = u16::try_from((value >> 96) & 0xFFFF).ok()?;
    (service_uuid(short) == *uuid).then_some(short)
}

// ── Peripherals ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Peripheral {
    address: DeviceAddress,
    name: String,
    services: Vec<Uuid>,
    base_rssi: i16,
}

impl Peripheral {
    fn numbered(index: usize) -> Self {
        let octet = index % 256;
        let mut services = vec![service_uuid(PRIMARY_SERVICES[index % PRIMARY_SERVICES.len()])];
        if !services.contains(&service_uuid(BATTERY)) {
            services.push(service_uuid(BATTERY));
        }
        let step = i16::try_from(index % 8).unwrap_or(0);

        Self {
            address: DeviceAddress::new(format!("0C:B1:E0:00:00:{octet:02X}")),
            name: format!("sim-{index}"),
            services,
            base_rssi: -48 - step * 6,
        }
    }

    /// One advertisement; `tick` wobbles the signal strength a little.
    fn advertise(&self, tick: usize) -> RawScanResult {
        let wobble = i16::try_from(tick % 5).unwrap_or(0) - 2;

        let mut record = BytesMut::with_capacity(3 + 2 + self.name.len());
        record.put_slice(&[0x02, 0x01, 0x06]);
        let name = self.name.as_bytes();
        if let Ok(len) = u8::try_from(name.len() + 1) {
            record.put_u8(len);
            record.put_u8(0x09);
            record.put_slice(name);
        }

        RawScanResult {
            address: self.address.clone(),
            name: Some(self.name.clone()),
            rssi: self.base_rssi + wobble,
            services: self.services.clone(),
            scan_record: record.freeze(),
        }
    }
}

// ── SimulatedRadio ───────────────────────────────────────────────────

/// Adapter, location source and advertiser in one.
#[derive(Debug)]
pub struct SimulatedRadio {
    settings: SimulatorSettings,
    peripherals: Arc<[Peripheral]>,
    watcher: AdapterStateWatcher,
    enabled: Arc<AtomicBool>,
    scans: Mutex<HashMap<ScanSinkId, CancellationToken>>,
    started: AtomicUsize,
}

impl SimulatedRadio {
    pub fn new(settings: SimulatorSettings, watcher: AdapterStateWatcher) -> Self {
        let peripherals = (0..settings.devices).map(Peripheral::numbered).collect();
        Self {
            settings,
            peripherals,
            watcher,
            enabled: Arc::new(AtomicBool::new(true)),
            scans: Mutex::new(HashMap::new()),
            started: AtomicUsize::new(0),
        }
    }

    /// Turn the adapter off, announcing each transition the way a platform
    /// would.
    pub fn power_off(&self) {
        if !self.enabled.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("simulated adapter powering off");
        self.watcher.publish(AdapterState::TurningOff);
        self.watcher.publish(AdapterState::Off);
    }

    /// Hardware scans currently running.
    pub fn active_scans(&self) -> usize {
        self.scans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Hardware scans started over the radio's lifetime.
    pub fn scans_started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

impl AdapterWrapper for SimulatedRadio {
    fn has_adapter(&self) -> bool {
        true
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn bonded_devices(&self) -> Vec<DeviceAddress> {
        self.settings
            .bonded
            .iter()
            .map(DeviceAddress::new)
            .collect()
    }

    fn start_scan(&self, mode: ScanMode, sink: ScanSink) -> Result<(), ScanError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|err| {
            ScanError::CannotStart {
                message: err.to_string(),
            }
        })?;

        let id = sink.id();
        let token = CancellationToken::new();
        self.scans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, token.clone());
        self.started.fetch_add(1, Ordering::SeqCst);
        debug!(%id, %mode, "simulated scan started");

        let peripherals = Arc::clone(&self.peripherals);
        let enabled = Arc::clone(&self.enabled);
        let period = self.settings.advertise_interval;

        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut tick = 0_usize;

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                // An adapter that is off hears nothing.
                if !enabled.load(Ordering::SeqCst) {
                    continue;
                }

                for peripheral in peripherals.iter() {
                    if !sink.deliver(peripheral.advertise(tick)) {
                        debug!(%id, "simulated scan has no listener");
                        return;
                    }
                }
                tick = tick.wrapping_add(1);
            }
        });

        Ok(())
    }

    fn stop_scan(&self, id: ScanSinkId) {
        let token = self
            .scans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if let Some(token) = token {
            token.cancel();
            debug!(%id, "simulated scan stopped");
        }
    }
}

impl LocationStatus for SimulatedRadio {
    fn permission_granted(&self) -> bool {
        true
    }

    fn service_enabled(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::StreamExt;

    use super::*;

    fn settings(devices: usize) -> SimulatorSettings {
        SimulatorSettings {
            devices,
            advertise_interval: Duration::from_millis(10),
            bonded: vec!["0c-b1-e0-00-00-01".into()],
        }
    }

    #[test]
    fn short_services_round_trip_through_the_base_uuid() {
        let uuid = service_uuid(HEART_RATE);
        assert_eq!(uuid.to_string(), "0000180d-0000-1000-8000-00805f9b34fb");
        assert_eq!(short_service(&uuid), Some(HEART_RATE));
        assert_eq!(short_service(&Uuid::from_u128(7)), None);
    }

    #[test]
    fn every_peripheral_advertises_battery() {
        for index in 0..6 {
            let peripheral = Peripheral::numbered(index);
            assert!(peripheral.services.contains(&service_uuid(BATTERY)));
        }
        assert_eq!(Peripheral::numbered(2).services.len(), 1);
    }

    #[test]
    fn advertisement_carries_flags_and_name() {
        let raw = Peripheral::numbered(1).advertise(0);
        assert_eq!(raw.address.as_str(), "0C:B1:E0:00:00:01");
        assert_eq!(
            raw.scan_record.as_ref(),
            &[0x02, 0x01, 0x06, 0x06, 0x09, b's', b'i', b'm', b'-', b'1']
        );
    }

    #[test]
    fn bonded_addresses_are_normalized() {
        let radio = SimulatedRadio::new(settings(1), AdapterStateWatcher::new(4));
        let bonded = radio.bonded_devices();
        assert_eq!(bonded, vec![DeviceAddress::new("0C:B1:E0:00:00:01")]);
    }

    #[tokio::test]
    async fn power_off_announces_transitions_once() {
        let watcher = AdapterStateWatcher::new(4);
        let radio = SimulatedRadio::new(settings(1), watcher.clone());
        let mut changes = watcher.changes();

        radio.power_off();
        radio.power_off();

        assert_eq!(changes.next().await, Some(AdapterState::TurningOff));
        assert_eq!(changes.next().await, Some(AdapterState::Off));
        assert!(!radio.is_enabled());
        assert_eq!(watcher.subscriber_count(), 1);
    }
}
