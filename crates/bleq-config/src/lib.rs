//! Configuration for the bleq CLI.
//!
//! TOML profiles merged with `BLEQ_`-prefixed environment variables, and
//! translation of a named profile into `bleq_core::ClientConfig` plus the
//! simulator settings the CLI needs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bleq_core::{ClientConfig, CoreError};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' is not defined")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some(DEFAULT_PROFILE.into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

const DEFAULT_PROFILE: &str = "default";

/// Values every profile falls back to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_true")]
    pub location_gated: bool,

    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,

    #[serde(default = "default_state_channel_capacity")]
    pub state_channel_capacity: usize,

    /// Number of simulated peripherals advertising.
    #[serde(default = "default_devices")]
    pub devices: usize,

    #[serde(default = "default_advertise_interval_ms")]
    pub advertise_interval_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            location_gated: default_true(),
            broadcast_capacity: default_broadcast_capacity(),
            state_channel_capacity: default_state_channel_capacity(),
            devices: default_devices(),
            advertise_interval_ms: default_advertise_interval_ms(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_true() -> bool {
    true
}
fn default_broadcast_capacity() -> usize {
    ClientConfig::default().broadcast_capacity
}
fn default_state_channel_capacity() -> usize {
    ClientConfig::default().state_channel_capacity
}
fn default_devices() -> usize {
    3
}
fn default_advertise_interval_ms() -> u64 {
    200
}

/// A named profile. Unset fields inherit from [`Defaults`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    pub location_gated: Option<bool>,
    pub broadcast_capacity: Option<usize>,
    pub state_channel_capacity: Option<usize>,
    pub devices: Option<usize>,
    pub advertise_interval_ms: Option<u64>,

    /// Addresses the simulated adapter reports as bonded.
    #[serde(default)]
    pub bonded: Vec<String>,
}

/// Simulated radio knobs resolved from a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorSettings {
    pub devices: usize,
    pub advertise_interval: Duration,
    pub bonded: Vec<String>,
}

/// A profile with every default applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProfile {
    pub name: String,
    pub client: ClientConfig,
    pub simulator: SimulatorSettings,
}

impl Config {
    /// Resolve `name` (or the default profile) against the defaults.
    ///
    /// The default profile may be absent from the file, in which case the
    /// defaults apply as-is. An explicitly named profile must exist.
    pub fn resolve_profile(&self, name: Option<&str>) -> Result<ResolvedProfile, ConfigError> {
        let default_name = self.default_profile.as_deref().unwrap_or(DEFAULT_PROFILE);
        let name = name.unwrap_or(default_name);

        let fallback = Profile::default();
        let profile = match self.profiles.get(name) {
            Some(profile) => profile,
            None if name == default_name => &fallback,
            None => {
                return Err(ConfigError::UnknownProfile { name: name.into() });
            }
        };

        let client = profile_to_client_config(profile, &self.defaults)?;
        let simulator = SimulatorSettings {
            devices: profile.devices.unwrap_or(self.defaults.devices),
            advertise_interval: Duration::from_millis(
                profile
                    .advertise_interval_ms
                    .unwrap_or(self.defaults.advertise_interval_ms),
            ),
            bonded: profile.bonded.clone(),
        };
        if simulator.advertise_interval.is_zero() {
            return Err(ConfigError::Validation {
                field: "advertise_interval_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }

        Ok(ResolvedProfile {
            name: name.into(),
            client,
            simulator,
        })
    }
}

/// Build a validated `ClientConfig` from a profile and the defaults.
pub fn profile_to_client_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let config = ClientConfig {
        location_gated: profile.location_gated.unwrap_or(defaults.location_gated),
        broadcast_capacity: profile
            .broadcast_capacity
            .unwrap_or(defaults.broadcast_capacity),
        state_channel_capacity: profile
            .state_channel_capacity
            .unwrap_or(defaults.state_channel_capacity),
    };

    config.validate().map_err(|err| match err {
        CoreError::Config { message } => ConfigError::Validation {
            field: "profile".into(),
            reason: message,
        },
        other => ConfigError::Validation {
            field: "profile".into(),
            reason: other.to_string(),
        },
    })?;
    Ok(config)
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "bleq", "bleq").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("bleq");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Environment keys nest with a double underscore, e.g.
/// `BLEQ_DEFAULTS__DEVICES=5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("BLEQ_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_jail| {
            let config = load_config_from(Path::new("absent.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config, Config::default());
            Ok(())
        });
    }

    #[test]
    fn file_and_env_are_merged() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                default_profile = "lab"

                [defaults]
                devices = 2

                [profiles.lab]
                broadcast_capacity = 32
                bonded = ["AA:BB:CC:DD:EE:01"]
                "#,
            )?;
            jail.set_env("BLEQ_DEFAULTS__ADVERTISE_INTERVAL_MS", "50");

            let config = load_config_from(Path::new("config.toml")).map_err(|e| e.to_string())?;
            let resolved = config.resolve_profile(None).map_err(|e| e.to_string())?;

            assert_eq!(resolved.name, "lab");
            assert_eq!(resolved.client.broadcast_capacity, 32);
            assert_eq!(resolved.client.state_channel_capacity, 16);
            assert!(resolved.client.location_gated);
            assert_eq!(resolved.simulator.devices, 2);
            assert_eq!(resolved.simulator.advertise_interval, Duration::from_millis(50));
            assert_eq!(resolved.simulator.bonded, vec!["AA:BB:CC:DD:EE:01".to_string()]);
            Ok(())
        });
    }

    #[test]
    fn default_profile_may_be_implicit() {
        let resolved = Config::default().resolve_profile(None).unwrap();
        assert_eq!(resolved.name, "default");
        assert_eq!(resolved.client, ClientConfig::default());
    }

    #[test]
    fn named_profile_must_exist() {
        let err = Config::default().resolve_profile(Some("garage")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile { ref name } if name == "garage"));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut config = Config::default();
        config.profiles.insert(
            "broken".into(),
            Profile {
                broadcast_capacity: Some(0),
                ..Profile::default()
            },
        );

        let err = config.resolve_profile(Some("broken")).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = Config::default();
        config.defaults.advertise_interval_ms = 0;

        assert!(matches!(
            config.resolve_profile(None),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn saved_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.profiles.insert(
            "lab".into(),
            Profile {
                devices: Some(7),
                location_gated: Some(false),
                ..Profile::default()
            },
        );
        save_config_to(&config, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("profiles.lab"));

        let loaded: Config = toml::from_str(&text).unwrap();
        assert_eq!(loaded, config);
    }
}
