//! Config subcommand handlers.

use std::fmt::Write as _;

use serde::Serialize;

use bleq_config::{Config, ResolvedProfile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

/// Resolved profile as printed by `config show`.
#[derive(Serialize)]
struct ProfileView {
    name: String,
    location_gated: bool,
    broadcast_capacity: usize,
    state_channel_capacity: usize,
    devices: usize,
    advertise_interval: String,
    bonded: Vec<String>,
}

impl From<ResolvedProfile> for ProfileView {
    fn from(profile: ResolvedProfile) -> Self {
        Self {
            name: profile.name,
            location_gated: profile.client.location_gated,
            broadcast_capacity: profile.client.broadcast_capacity,
            state_channel_capacity: profile.client.state_channel_capacity,
            devices: profile.simulator.devices,
            advertise_interval: humantime::format_duration(profile.simulator.advertise_interval)
                .to_string(),
            bonded: profile.simulator.bonded,
        }
    }
}

fn detail(view: &ProfileView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Profile:                {}", view.name);
    let _ = writeln!(out, "Location gated:         {}", view.location_gated);
    let _ = writeln!(out, "Broadcast capacity:     {}", view.broadcast_capacity);
    let _ = writeln!(out, "State channel capacity: {}", view.state_channel_capacity);
    let _ = writeln!(out, "Simulated devices:      {}", view.devices);
    let _ = writeln!(out, "Advertise interval:     {}", view.advertise_interval);
    let bonded = if view.bonded.is_empty() {
        "-".to_owned()
    } else {
        view.bonded.join(", ")
    };
    let _ = write!(out, "Bonded:                 {bonded}");
    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path(global).display().to_string());
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let format = output::resolve_format(global.output, &cfg.defaults.output)?;
            let view = ProfileView::from(config::resolve(&cfg, global)?);

            let rendered = output::render_single(format, &view, detail, |v| v.name.clone())?;
            output::print_output(&rendered);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            let path = config::config_path(global);
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            bleq_config::save_config_to(&Config::default(), &path)?;
            eprintln!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}
