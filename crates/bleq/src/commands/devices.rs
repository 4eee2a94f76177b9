//! Bonded device listing.

use tabled::Tabled;

use bleq_core::Device;

use crate::error::CliError;
use crate::output;
use crate::session::Session;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Address")]
    address: String,
}

impl From<&Device> for DeviceRow {
    fn from(device: &Device) -> Self {
        Self {
            address: device.address.to_string(),
        }
    }
}

pub fn handle(session: &Session) -> Result<(), CliError> {
    let devices = session.client.bonded_devices()?;

    let rendered = output::render_list(
        session.format,
        &devices,
        |device| DeviceRow::from(&**device),
        |device| device.address.to_string(),
    )?;
    output::print_output(&rendered);
    Ok(())
}
