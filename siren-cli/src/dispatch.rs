//! `dispatch` and `history` commands.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use siren_api::{DEFAULT_HISTORY_LIMIT, DispatchResponse};
use siren_core::{
    AllocationStore, DepotPolicy, DispatchOrchestrator, DispatchRequest, OrchestratorConfig,
    SqliteDispatchStore, VehicleType,
};

use crate::{
    ARG_DATABASE, ARG_DEPOT_POLICY, ARG_DESTINATION, ARG_INCIDENT, ARG_LIMIT,
    ARG_MAX_CONFLICT_RETRIES, ARG_VEHICLE, CliError, ENV_DISPATCH_DATABASE, ENV_DISPATCH_VEHICLE,
    ENV_HISTORY_DATABASE, require_existing, serve::orchestrator_config, write_json,
};

/// CLI arguments for the `dispatch` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Dispatch one vehicle. With --destination the unit leaves \
                 the vehicle type's depot; with --incident the closest zone \
                 holding a unit supplies it.",
    about = "Dispatch one vehicle and print the result"
)]
#[ortho_config(prefix = "SIREN")]
pub(crate) struct DispatchArgs {
    /// Path to the SQLite dispatch database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Vehicle type to dispatch.
    #[arg(long = ARG_VEHICLE, value_name = "type")]
    #[serde(default)]
    pub(crate) vehicle: Option<VehicleType>,
    /// Destination zone code; the unit leaves from the depot.
    #[arg(long = ARG_DESTINATION, value_name = "code")]
    #[serde(default)]
    pub(crate) destination: Option<String>,
    /// Incident zone code; the nearest stocked zone supplies the unit.
    #[arg(long = ARG_INCIDENT, value_name = "code")]
    #[serde(default)]
    pub(crate) incident: Option<String>,
    /// Depot selection policy (`single` or `nearest`).
    #[arg(long = ARG_DEPOT_POLICY, value_name = "policy")]
    #[serde(default)]
    pub(crate) depot_policy: Option<DepotPolicy>,
    /// Fresh-snapshot retries after a lost race in nearest-available mode.
    #[arg(long = ARG_MAX_CONFLICT_RETRIES, value_name = "count")]
    #[serde(default)]
    pub(crate) max_conflict_retries: Option<u32>,
}

impl DispatchArgs {
    fn into_config(self) -> Result<DispatchConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        DispatchConfig::try_from(merged)
    }
}

/// Resolved `dispatch` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DispatchConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) request: DispatchRequest,
    pub(crate) orchestrator: OrchestratorConfig,
}

impl TryFrom<DispatchArgs> for DispatchConfig {
    type Error = CliError;

    fn try_from(args: DispatchArgs) -> Result<Self, Self::Error> {
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_DISPATCH_DATABASE,
        })?;
        let vehicle = args.vehicle.ok_or(CliError::MissingArgument {
            field: ARG_VEHICLE,
            env: ENV_DISPATCH_VEHICLE,
        })?;
        let request = match (args.destination, args.incident) {
            (Some(_), Some(_)) => return Err(CliError::ConflictingTargets),
            (None, None) => return Err(CliError::MissingTarget),
            (Some(destination), None) => DispatchRequest::to_destination(vehicle, destination),
            (None, Some(incident)) => DispatchRequest::for_incident(vehicle, incident),
        };
        Ok(Self {
            database,
            request,
            orchestrator: orchestrator_config(args.depot_policy, args.max_conflict_retries),
        })
    }
}

pub(crate) fn run_dispatch_with(
    args: DispatchArgs,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    execute_dispatch(&config, writer)
}

pub(crate) fn execute_dispatch(
    config: &DispatchConfig,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    require_existing(&config.database, ARG_DATABASE)?;
    let store = SqliteDispatchStore::open(&config.database)?;
    let outcome = DispatchOrchestrator::new(&store, &store)
        .with_config(config.orchestrator)
        .dispatch(&config.request)?;
    write_json(writer, &DispatchResponse::from(outcome))
}

/// CLI arguments for the `history` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Print the most recent dispatch records, newest first")]
#[ortho_config(prefix = "SIREN")]
pub(crate) struct HistoryArgs {
    /// Path to the SQLite dispatch database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Maximum number of records to print.
    #[arg(long = ARG_LIMIT, value_name = "count")]
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

impl HistoryArgs {
    fn into_config(self) -> Result<HistoryConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        HistoryConfig::try_from(merged)
    }
}

/// Resolved `history` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HistoryConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) limit: usize,
}

impl TryFrom<HistoryArgs> for HistoryConfig {
    type Error = CliError;

    fn try_from(args: HistoryArgs) -> Result<Self, Self::Error> {
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_HISTORY_DATABASE,
        })?;
        Ok(Self {
            database,
            limit: args.limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
        })
    }
}

pub(crate) fn run_history_with(args: HistoryArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    execute_history(&config, writer)
}

pub(crate) fn execute_history(
    config: &HistoryConfig,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    require_existing(&config.database, ARG_DATABASE)?;
    let store = SqliteDispatchStore::open(&config.database)?;
    let records = store.recent_dispatches(config.limit)?;
    write_json(writer, &records)
}

#[cfg(test)]
pub(crate) fn dispatch_config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<DispatchConfig, CliError> {
    let merged = DispatchArgs::merge_from_layers(layers).map_err(CliError::from)?;
    DispatchConfig::try_from(merged)
}
