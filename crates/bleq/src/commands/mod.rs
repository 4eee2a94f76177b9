//! Command dispatch for radio-bound commands.

pub mod config_cmd;
pub mod devices;
pub mod scan;

use crate::cli::Command;
use crate::error::CliError;
use crate::session::Session;

/// Dispatch a command that needs a running client.
pub async fn dispatch(cmd: Command, session: &Session) -> Result<(), CliError> {
    match cmd {
        Command::Scan(args) => scan::handle(session, args).await,
        Command::Devices => devices::handle(session),
        // Config and Completions are handled before a session exists
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
