//! Bridges the global flags to `bleq-config`: which file to read and which
//! profile to resolve.

use std::path::PathBuf;

use bleq_config::{Config, ConfigError, ResolvedProfile};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// `--config` if given, otherwise the platform config path.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(bleq_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(bleq_config::load_config_from(&config_path(global))?)
}

/// Resolve the active profile, listing the known ones when it is missing.
pub fn resolve(cfg: &Config, global: &GlobalOpts) -> Result<ResolvedProfile, CliError> {
    cfg.resolve_profile(global.profile.as_deref())
        .map_err(|err| match err {
            ConfigError::UnknownProfile { name } => {
                let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
                names.sort_unstable();
                let available = if names.is_empty() {
                    "(none)".to_owned()
                } else {
                    names.join(", ")
                };
                CliError::ProfileNotFound { name, available }
            }
            other => other.into(),
        })
}
