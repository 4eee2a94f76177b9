//! Everything a radio-bound command needs: the client, the simulated radio
//! behind it, and the output settings.

use std::sync::Arc;

use tracing::debug;

use bleq_core::{AdapterStateWatcher, BleClient};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;
use crate::sim::SimulatedRadio;

pub struct Session {
    pub client: BleClient,
    pub radio: Arc<SimulatedRadio>,
    pub format: OutputFormat,
    pub color: bool,
}

impl Session {
    /// Load config, resolve the profile and start a client over a fresh
    /// simulated radio. Must run inside the tokio runtime.
    pub fn open(global: &GlobalOpts) -> Result<Self, CliError> {
        let cfg = config::load(global)?;
        let profile = config::resolve(&cfg, global)?;
        let format = output::resolve_format(global.output, &cfg.defaults.output)?;
        debug!(profile = %profile.name, ?format, "session profile resolved");

        let watcher = AdapterStateWatcher::new(profile.client.state_channel_capacity);
        let radio = Arc::new(SimulatedRadio::new(profile.simulator, watcher.clone()));
        let client = BleClient::builder()
            .config(profile.client)
            .adapter(radio.clone())
            .location(radio.clone())
            .state_watcher(watcher)
            .build()?;

        Ok(Self {
            client,
            radio,
            format,
            color: output::should_color(global.color),
        })
    }

    pub async fn close(&self) {
        self.client.shutdown().await;
        debug!(
            started = self.radio.scans_started(),
            still_active = self.radio.active_scans(),
            "session closed"
        );
    }
}
