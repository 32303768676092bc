//! `serve` command: run the HTTP API.

use std::{net::SocketAddr, sync::Arc};

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use siren_api::AppState;
use siren_core::{DepotPolicy, OrchestratorConfig, SqliteDispatchStore};
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    ARG_BIND, ARG_DATABASE, ARG_DEPOT_POLICY, ARG_MAX_CONFLICT_RETRIES, CliError,
    ENV_SERVE_DATABASE, require_existing,
};

/// Address the API listens on when none is configured.
pub(crate) const DEFAULT_BIND: SocketAddr =
    SocketAddr::V4(std::net::SocketAddrV4::new(std::net::Ipv4Addr::LOCALHOST, 8080));

/// CLI arguments for the `serve` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Serve the dispatch API over a provisioned SQLite database. \
                 Options can come from CLI flags, configuration files, or \
                 environment variables.",
    about = "Serve the dispatch HTTP API"
)]
#[ortho_config(prefix = "SIREN")]
pub(crate) struct ServeArgs {
    /// Path to the SQLite dispatch database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Socket address to listen on.
    #[arg(long = ARG_BIND, value_name = "addr")]
    #[serde(default)]
    pub(crate) bind: Option<SocketAddr>,
    /// Depot selection policy (`single` or `nearest`).
    #[arg(long = ARG_DEPOT_POLICY, value_name = "policy")]
    #[serde(default)]
    pub(crate) depot_policy: Option<DepotPolicy>,
    /// Fresh-snapshot retries after a lost race in nearest-available mode.
    #[arg(long = ARG_MAX_CONFLICT_RETRIES, value_name = "count")]
    #[serde(default)]
    pub(crate) max_conflict_retries: Option<u32>,
}

impl ServeArgs {
    fn into_config(self) -> Result<ServeConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ServeConfig::try_from(merged)
    }
}

/// Resolved `serve` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServeConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) bind: SocketAddr,
    pub(crate) orchestrator: OrchestratorConfig,
}

impl TryFrom<ServeArgs> for ServeConfig {
    type Error = CliError;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_SERVE_DATABASE,
        })?;
        Ok(Self {
            database,
            bind: args.bind.unwrap_or(DEFAULT_BIND),
            orchestrator: orchestrator_config(args.depot_policy, args.max_conflict_retries),
        })
    }
}

/// Orchestrator settings with unset options left at their defaults.
pub(crate) fn orchestrator_config(
    depot_policy: Option<DepotPolicy>,
    max_conflict_retries: Option<u32>,
) -> OrchestratorConfig {
    let defaults = OrchestratorConfig::default();
    OrchestratorConfig {
        depot_policy: depot_policy.unwrap_or(defaults.depot_policy),
        max_conflict_retries: max_conflict_retries.unwrap_or(defaults.max_conflict_retries),
    }
}

pub(crate) fn run_serve(args: ServeArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    require_existing(&config.database, ARG_DATABASE)?;
    let store = SqliteDispatchStore::open(&config.database)?;
    let state = AppState::new(Arc::new(store)).with_config(config.orchestrator);
    info!(
        database = %config.database,
        policy = %config.orchestrator.depot_policy,
        "starting dispatch API"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(async move {
        let listener = TcpListener::bind(config.bind)
            .await
            .map_err(|source| CliError::Bind {
                address: config.bind,
                source,
            })?;
        siren_api::serve(listener, state)
            .await
            .map_err(CliError::Serve)
    })
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ServeConfig, CliError> {
    let merged = ServeArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ServeConfig::try_from(merged)
}
