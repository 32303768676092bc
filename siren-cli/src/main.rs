//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use std::process::ExitCode;

use siren_cli::CliError;
use tracing_subscriber::EnvFilter;

#[expect(
    clippy::print_stderr,
    reason = "the binary reports fatal errors on stderr before exiting"
)]
fn main() -> ExitCode {
    init_logging();
    match siren_cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("siren: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr so command output on stdout stays machine-readable.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_err()
    {
        // A subscriber installed by an embedding process wins.
    }
}
