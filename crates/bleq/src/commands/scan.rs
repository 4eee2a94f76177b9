//! `bleq scan`: run a scan until the deadline, the first error, or the end
//! of the stream.

use std::collections::BTreeMap;

use futures_util::StreamExt;
use tabled::Tabled;
use tracing::{debug, info};

use bleq_core::{DeviceAddress, ScanFilter, ScanResult, ScanSettings};

use crate::cli::{OutputFormat, ScanArgs};
use crate::error::CliError;
use crate::output;
use crate::session::Session;

// ── Summary ──────────────────────────────────────────────────────────

#[derive(Tabled)]
struct SightingRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "RSSI")]
    rssi: i16,
    #[tabled(rename = "Services")]
    services: String,
    #[tabled(rename = "Seen")]
    seen: usize,
}

/// Latest sighting per device, in address order.
#[derive(Default)]
struct Sightings {
    rows: BTreeMap<DeviceAddress, SightingRow>,
}

impl Sightings {
    fn record(&mut self, result: &ScanResult) {
        let row = self
            .rows
            .entry(result.device.address.clone())
            .or_insert_with(|| SightingRow {
                address: result.device.address.to_string(),
                name: String::new(),
                rssi: result.rssi,
                services: String::new(),
                seen: 0,
            });
        row.name = result.name.clone().unwrap_or_default();
        row.rssi = result.rssi;
        row.services = output::format_services(&result.services);
        row.seen += 1;
    }

    fn render(&self) -> String {
        let rows: Vec<&SightingRow> = self.rows.values().collect();
        output::render_table(&rows)
    }
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(session: &Session, args: ScanArgs) -> Result<(), CliError> {
    let mut stream = match args.mode {
        Some(mode) => {
            let filters = args.services.iter().copied().map(ScanFilter::by_service).collect();
            session
                .client
                .scan_with_settings(ScanSettings::with_mode(mode), filters)
        }
        None => session.client.scan(args.services.iter().copied()),
    };

    let power_off = args.power_off_after.map(|delay| {
        let radio = session.radio.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            radio.power_off();
        })
    });

    info!(duration = ?args.duration, mode = ?args.mode, "scanning");
    let deadline = tokio::time::sleep(args.duration);
    tokio::pin!(deadline);

    let mut sightings = Sightings::default();
    let mut received = 0_usize;
    let outcome = loop {
        tokio::select! {
            () = &mut deadline => break Ok(()),
            item = stream.next() => match item {
                Some(Ok(result)) => {
                    received += 1;
                    if let Some(line) = output::render_scan_line(session.format, session.color, &result)? {
                        output::print_output(&line);
                    }
                    sightings.record(&result);
                }
                Some(Err(err)) => break Err(CliError::from(err)),
                None => break Ok(()),
            },
        }
    };

    if let Some(task) = power_off {
        task.abort();
    }
    drop(stream);
    debug!(received, "scan finished");

    if session.format == OutputFormat::Table {
        output::print_output(&sightings.render());
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use bleq_core::{Device, Uuid};

    use super::*;

    fn sighting(address: &str, rssi: i16) -> ScanResult {
        ScanResult {
            device: Arc::new(Device::new(DeviceAddress::new(address))),
            name: Some("probe".into()),
            rssi,
            services: vec![Uuid::from_u128(1)],
            scan_record: bytes::Bytes::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn sightings_keep_the_latest_reading_per_device() {
        let mut sightings = Sightings::default();
        sightings.record(&sighting("00:00:00:00:00:02", -70));
        sightings.record(&sighting("00:00:00:00:00:01", -50));
        sightings.record(&sighting("00:00:00:00:00:02", -65));

        let rows: Vec<_> = sightings.rows.values().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].address, "00:00:00:00:00:01");
        assert_eq!(rows[1].rssi, -65);
        assert_eq!(rows[1].seen, 2);
        assert!(sightings.render().contains("probe"));
    }
}
