//! Clap derive structures for the `bleq` CLI.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use bleq_core::{ScanMode, Uuid};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// bleq -- deduplicated BLE scans over a serialized radio queue
#[derive(Debug, Parser)]
#[command(
    name = "bleq",
    version,
    about = "Run deduplicated BLE scans against a simulated radio",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration profile to use
    #[arg(long, short = 'p', env = "BLEQ_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file to use instead of the platform default
    #[arg(long, env = "BLEQ_CONFIG", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format (defaults to the configured `output`)
    #[arg(long, short = 'o', env = "BLEQ_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table
    Table,
    /// Pretty-printed JSON (one compact object per line when streaming)
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one record per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan for advertising peripherals
    #[command(alias = "s")]
    Scan(ScanArgs),

    /// List bonded devices
    #[command(alias = "dev", alias = "d")]
    Devices,

    /// Inspect or create the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Service UUID every result must advertise (repeatable)
    #[arg(long = "service", short = 's', value_name = "UUID")]
    pub services: Vec<Uuid>,

    /// How long to scan
    #[arg(long, short = 'd', default_value = "5s", value_parser = humantime::parse_duration)]
    pub duration: Duration,

    /// Power the simulated adapter off after this long
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub power_off_after: Option<Duration>,

    /// Run a dedicated scan in this mode instead of joining a shared one
    #[arg(long, value_parser = parse_scan_mode)]
    pub mode: Option<ScanMode>,
}

fn parse_scan_mode(raw: &str) -> Result<ScanMode, String> {
    raw.parse().map_err(|_| {
        format!("unknown scan mode '{raw}' (expected opportunistic, low-power, balanced or low-latency)")
    })
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Print the resolved profile
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
