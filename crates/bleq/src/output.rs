//! Output formatting: table, JSON, plain.
//!
//! Table uses `tabled`, structured formats use serde, plain emits one
//! record per line. Scan results stream line by line in every format but
//! table, which summarizes once the scan ends.

use std::io::{self, IsTerminal, Write};

use clap::ValueEnum;
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use bleq_core::{ScanResult, Uuid};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;
use crate::sim::short_service;

// ── Format selection ─────────────────────────────────────────────────

/// Pick the output format: the flag wins, then the configured default.
pub fn resolve_format(flag: Option<OutputFormat>, configured: &str) -> Result<OutputFormat, CliError> {
    if let Some(format) = flag {
        return Ok(format);
    }
    OutputFormat::from_str(configured, true).map_err(|_| CliError::Validation {
        field: "defaults.output".into(),
        reason: format!("unknown output format '{configured}'"),
    })
}

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of items in the chosen format.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize,
    R: Tabled,
{
    Ok(match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false)?,
        OutputFormat::JsonCompact => render_json(data, true)?,
        OutputFormat::Plain => data.iter().map(id_fn).collect::<Vec<_>>().join("\n"),
    })
}

/// Render a single item. Table mode uses `detail_fn`.
pub fn render_single<T: Serialize>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false)?,
        OutputFormat::JsonCompact => render_json(data, true)?,
        OutputFormat::Plain => id_fn(data),
    })
}

/// One streamed scan result, or `None` when the format only summarizes.
///
/// JSON formats emit one compact object per line so the stream stays
/// line-delimited.
pub fn render_scan_line(
    format: OutputFormat,
    color: bool,
    result: &ScanResult,
) -> Result<Option<String>, CliError> {
    match format {
        OutputFormat::Table => Ok(None),
        OutputFormat::Json | OutputFormat::JsonCompact => Ok(Some(render_json(result, true)?)),
        OutputFormat::Plain => {
            let rssi = if color {
                paint_rssi(result.rssi)
            } else {
                result.rssi.to_string()
            };
            Ok(Some(format!(
                "{}\t{rssi}\t{}",
                result.device.address,
                format_services(&result.services)
            )))
        }
    }
}

/// Print rendered output to stdout.
pub fn print_output(output: &str) {
    if output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let rendered = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(rendered)
}

// ── Field helpers ────────────────────────────────────────────────────

/// Services as a comma-separated list, 16-bit ids in short form.
pub fn format_services(services: &[Uuid]) -> String {
    services
        .iter()
        .map(|uuid| short_service(uuid).map_or_else(|| uuid.to_string(), |short| format!("{short:04X}")))
        .collect::<Vec<_>>()
        .join(",")
}

fn paint_rssi(rssi: i16) -> String {
    match rssi {
        -60.. => rssi.green().to_string(),
        -75..=-61 => rssi.yellow().to_string(),
        _ => rssi.red().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::service_uuid;

    #[test]
    fn flag_overrides_configured_format() {
        let format = resolve_format(Some(OutputFormat::Plain), "table").ok();
        assert_eq!(format, Some(OutputFormat::Plain));
    }

    #[test]
    fn configured_format_is_case_insensitive() {
        let format = resolve_format(None, "JSON-COMPACT").ok();
        assert_eq!(format, Some(OutputFormat::JsonCompact));
    }

    #[test]
    fn unknown_configured_format_is_a_usage_error() {
        let err = resolve_format(None, "yaml").err();
        assert!(matches!(err, Some(CliError::Validation { .. })));
    }

    #[test]
    fn services_use_short_form_when_possible() {
        let custom = Uuid::from_u128(0x1234);
        let text = format_services(&[service_uuid(0x180D), custom]);
        assert_eq!(text, format!("180D,{custom}"));
    }
}
