//! Command-line interface for the Siren dispatch engine.
//!
//! Subcommands:
//! - `serve` runs the HTTP API over a SQLite dispatch database.
//! - `dispatch` serves one request and prints the success envelope.
//! - `history` prints the most recent dispatch records.
//!
//! Options layer CLI flags over `SIREN_*` environment variables over
//! configuration files.
#![forbid(unsafe_code)]

use std::io::Write;

use camino::Utf8Path;
use clap::{Parser, Subcommand};
use serde::Serialize;

mod dispatch;
mod error;
mod serve;

pub use error::CliError;

use dispatch::{DispatchArgs, HistoryArgs};
use serve::ServeArgs;

pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_BIND: &str = "bind";
pub(crate) const ARG_DEPOT_POLICY: &str = "depot-policy";
pub(crate) const ARG_MAX_CONFLICT_RETRIES: &str = "max-conflict-retries";
pub(crate) const ARG_VEHICLE: &str = "vehicle";
pub(crate) const ARG_DESTINATION: &str = "destination";
pub(crate) const ARG_INCIDENT: &str = "incident";
pub(crate) const ARG_LIMIT: &str = "limit";
pub(crate) const ENV_SERVE_DATABASE: &str = "SIREN_CMDS_SERVE_DATABASE";
pub(crate) const ENV_DISPATCH_DATABASE: &str = "SIREN_CMDS_DISPATCH_DATABASE";
pub(crate) const ENV_DISPATCH_VEHICLE: &str = "SIREN_CMDS_DISPATCH_VEHICLE";
pub(crate) const ENV_HISTORY_DATABASE: &str = "SIREN_CMDS_HISTORY_DATABASE";

/// Run the Siren CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns [`CliError`] when arguments or configuration are invalid or the
/// selected command fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Serve(args) => serve::run_serve(args),
        Command::Dispatch(args) => {
            let mut stdout = std::io::stdout().lock();
            dispatch::run_dispatch_with(args, &mut stdout)
        }
        Command::History(args) => {
            let mut stdout = std::io::stdout().lock();
            dispatch::run_history_with(args, &mut stdout)
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "siren",
    about = "Emergency vehicle dispatch over a zone network",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the dispatch HTTP API.
    Serve(ServeArgs),
    /// Dispatch one vehicle and print the result.
    Dispatch(DispatchArgs),
    /// Print recent dispatch records.
    History(HistoryArgs),
}

/// Fail unless `path` names an existing regular file.
pub(crate) fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match path.metadata() {
        Ok(metadata) if metadata.is_file() => Ok(()),
        Ok(_) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Pretty-print `value` as JSON followed by a newline.
pub(crate) fn write_json<T: Serialize>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
mod tests;
