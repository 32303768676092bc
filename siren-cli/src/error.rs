//! Error types emitted by the Siren CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::{net::SocketAddr, sync::Arc};

use camino::Utf8PathBuf;
use siren_core::{DispatchError, SqliteStoreError, StoreError};
use thiserror::Error;

/// Errors emitted by the Siren CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name of the option.
        field: &'static str,
        /// Environment variable that can supply it.
        env: &'static str,
    },
    /// Both dispatch targets were supplied.
    #[error("pass either --destination or --incident, not both")]
    ConflictingTargets,
    /// Neither dispatch target was supplied.
    #[error("missing dispatch target (set --destination or --incident)")]
    MissingTarget,
    /// The database path does not exist.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        /// Flag name of the option.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// The database path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        /// Flag name of the option.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// The database path could not be inspected.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Flag name of the option.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// Opening the dispatch database failed.
    #[error(transparent)]
    OpenStore(#[from] SqliteStoreError),
    /// The dispatch was rejected.
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
    /// Reading the dispatch log failed.
    #[error("failed to read dispatch history: {0}")]
    ReadHistory(#[from] StoreError),
    /// Starting the async runtime failed.
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Binding the listen address failed.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Requested address.
        address: SocketAddr,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// The HTTP server stopped with an error.
    #[error("server failed: {0}")]
    Serve(#[source] std::io::Error),
    /// Serialising command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
