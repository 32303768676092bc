//! Request orchestration: snapshot, source selection, routing, allocation.
//!
//! Both dispatch modes share one pipeline. They differ only in how the
//! source zone is chosen:
//!
//! - depot-anchored requests send the depot's unit to a destination zone;
//! - nearest-available requests pull the closest stocked unit to an
//!   incident zone.

use std::{fmt, str::FromStr};

use log::{debug, warn};
use thiserror::Error;

use crate::{
    AllocationError, AllocationRequest, AllocationStore, AllocationTransaction, DispatchRecord,
    EdgeView, GraphStore, PathFinder, ShortestPath, SpanningForest, SpanningTreeBuilder,
    StoreError, VehicleType, ZoneGraph,
};

/// How the source zone of a dispatch is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchMode {
    /// Send the depot's unit to `destination`.
    DepotAnchored {
        /// Code of the zone the unit is sent to.
        destination: String,
    },
    /// Send the nearest stocked unit to `incident`.
    NearestAvailable {
        /// Code of the zone that needs the unit.
        incident: String,
    },
}

/// A single dispatch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    /// Vehicle type to send.
    pub vehicle_type: VehicleType,
    /// Source selection mode.
    pub mode: DispatchMode,
}

impl DispatchRequest {
    /// Depot-anchored request towards `destination`.
    pub fn to_destination(vehicle_type: VehicleType, destination: impl Into<String>) -> Self {
        Self {
            vehicle_type,
            mode: DispatchMode::DepotAnchored {
                destination: destination.into(),
            },
        }
    }

    /// Nearest-available request for `incident`.
    pub fn for_incident(vehicle_type: VehicleType, incident: impl Into<String>) -> Self {
        Self {
            vehicle_type,
            mode: DispatchMode::NearestAvailable {
                incident: incident.into(),
            },
        }
    }

    /// Code of the zone the unit must reach.
    #[must_use]
    pub fn target_code(&self) -> &str {
        match &self.mode {
            DispatchMode::DepotAnchored { destination } => destination,
            DispatchMode::NearestAvailable { incident } => incident,
        }
    }
}

/// How a depot-anchored request picks its depot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DepotPolicy {
    /// Exactly one depot per vehicle type; several flagged zones is an
    /// error.
    #[default]
    Single,
    /// Any number of depots; the one closest to the destination that still
    /// has a unit wins.
    Nearest,
}

impl DepotPolicy {
    /// Configuration name of the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Nearest => "nearest",
        }
    }
}

impl fmt::Display for DepotPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a depot policy name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown depot policy {value:?} (expected single or nearest)")]
pub struct DepotPolicyError {
    /// The rejected input.
    pub value: String,
}

impl FromStr for DepotPolicy {
    type Err = DepotPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "nearest" => Ok(Self::Nearest),
            _ => Err(DepotPolicyError {
                value: s.to_owned(),
            }),
        }
    }
}

/// Tunables for [`DispatchOrchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Depot selection in depot-anchored mode.
    pub depot_policy: DepotPolicy,
    /// Fresh-snapshot retries after a lost race in nearest-available mode.
    pub max_conflict_retries: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            depot_policy: DepotPolicy::Single,
            max_conflict_retries: 1,
        }
    }
}

/// A committed dispatch together with its display data.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// The persisted record.
    pub record: DispatchRecord,
    /// Spanning forest edges of the destination's component. Display only.
    pub spanning_edges: Vec<EdgeView>,
    /// Human-readable summary.
    pub message: String,
}

/// Failure classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchErrorKind {
    /// Bad input; rejected before any lookup or mutation.
    Validation,
    /// No unit could be sourced.
    ResourceUnavailable,
    /// The chosen source cannot reach the target.
    Connectivity,
    /// A concurrent dispatch took the unit first.
    Conflict,
    /// The store failed.
    Store,
}

/// Errors returned by [`DispatchOrchestrator::dispatch`].
///
/// None of them leave a counter or log change behind.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request named a zone code that is not in the network.
    #[error("zone code {code} not found")]
    UnknownZone {
        /// The unknown code.
        code: String,
    },
    /// No zone is flagged as depot for the vehicle type.
    #[error("no depot found for {vehicle_type}")]
    NoDepot {
        /// Vehicle type requested.
        vehicle_type: VehicleType,
    },
    /// Several zones are flagged as depot under the single-depot policy.
    #[error("several depots configured for {vehicle_type}: {}", codes.join(", "))]
    AmbiguousDepot {
        /// Vehicle type requested.
        vehicle_type: VehicleType,
        /// Codes of every flagged zone.
        codes: Vec<String>,
    },
    /// The depot has no unit of the vehicle type.
    #[error("no {vehicle_type} available at depot {depot}")]
    NoInventoryAtDepot {
        /// Vehicle type requested.
        vehicle_type: VehicleType,
        /// Depot zone code.
        depot: String,
    },
    /// No zone connected to the incident has a unit.
    #[error("no {vehicle_type} available in any zone connected to {incident}")]
    NoReachableInventory {
        /// Vehicle type requested.
        vehicle_type: VehicleType,
        /// Incident zone code.
        incident: String,
    },
    /// The source zone cannot reach the target zone.
    #[error("no path found from {from} to {to}")]
    Unreachable {
        /// Source zone code.
        from: String,
        /// Target zone code.
        to: String,
    },
    /// A concurrent dispatch claimed the unit first.
    #[error("the last {vehicle_type} at {zone} was claimed by a concurrent dispatch")]
    Conflict {
        /// Vehicle type requested.
        vehicle_type: VehicleType,
        /// Source zone code.
        zone: String,
    },
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DispatchError {
    /// Failure class of the error.
    #[must_use]
    pub const fn kind(&self) -> DispatchErrorKind {
        match self {
            Self::UnknownZone { .. } => DispatchErrorKind::Validation,
            Self::NoDepot { .. }
            | Self::AmbiguousDepot { .. }
            | Self::NoInventoryAtDepot { .. }
            | Self::NoReachableInventory { .. } => DispatchErrorKind::ResourceUnavailable,
            Self::Unreachable { .. } => DispatchErrorKind::Connectivity,
            Self::Conflict { .. } => DispatchErrorKind::Conflict,
            Self::Store(_) => DispatchErrorKind::Store,
        }
    }
}

/// Route chosen for one attempt.
struct Plan {
    route: ShortestPath,
    from_depot: bool,
}

/// Serves dispatch requests against a graph store and an allocation store.
///
/// Every attempt loads a fresh snapshot, so the orchestrator itself holds
/// no network state and can be shared between threads when its stores can.
#[derive(Debug, Clone)]
pub struct DispatchOrchestrator<G, A> {
    graphs: G,
    allocations: A,
    config: OrchestratorConfig,
}

impl<G, A> DispatchOrchestrator<G, A>
where
    G: GraphStore,
    A: AllocationStore,
{
    /// Orchestrator with the default configuration.
    pub fn new(graphs: G, allocations: A) -> Self {
        Self {
            graphs,
            allocations,
            config: OrchestratorConfig::default(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Store the orchestrator reads its snapshots from.
    #[must_use]
    pub const fn graph_store(&self) -> &G {
        &self.graphs
    }

    /// Store the orchestrator commits allocations through.
    #[must_use]
    pub const fn allocation_store(&self) -> &A {
        &self.allocations
    }

    /// Serve one request.
    ///
    /// A lost race in nearest-available mode is retried against a fresh
    /// snapshot up to [`OrchestratorConfig::max_conflict_retries`] times.
    /// Depot-anchored requests have a single eligible source and are never
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`]; see [`DispatchError::kind`] for the
    /// failure classes.
    pub fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchOutcome, DispatchError> {
        let retries = match request.mode {
            DispatchMode::DepotAnchored { .. } => 0,
            DispatchMode::NearestAvailable { .. } => self.config.max_conflict_retries,
        };
        let mut attempt = 0;
        loop {
            match self.attempt(request) {
                Err(DispatchError::Conflict { zone, .. }) if attempt < retries => {
                    attempt += 1;
                    warn!(
                        "{} at {zone} taken concurrently; retry {attempt}/{retries} for {}",
                        request.vehicle_type,
                        request.target_code()
                    );
                }
                result => return result,
            }
        }
    }

    fn attempt(&self, request: &DispatchRequest) -> Result<DispatchOutcome, DispatchError> {
        let graph = self.graphs.load_graph()?;
        let target_code = request.target_code();
        let target = graph
            .index_of(target_code)
            .ok_or_else(|| DispatchError::UnknownZone {
                code: target_code.to_owned(),
            })?;
        let vehicle = request.vehicle_type;

        let forest = SpanningTreeBuilder::new(&graph).build();
        let finder = PathFinder::new(&graph);
        let plan = match request.mode {
            DispatchMode::DepotAnchored { .. } => Plan {
                route: self.route_from_depot(&graph, &finder, vehicle, target)?,
                from_depot: true,
            },
            DispatchMode::NearestAvailable { .. } => Plan {
                route: nearest_stocked(&graph, &finder, vehicle, target)?,
                from_depot: false,
            },
        };
        debug!(
            "planned {vehicle} route {:?} ({} km)",
            plan.route.codes(&graph),
            plan.route.distance()
        );

        let allocation = AllocationRequest::new(&graph, vehicle, &plan.route).ok_or_else(|| {
            DispatchError::UnknownZone {
                code: target_code.to_owned(),
            }
        })?;
        let record = AllocationTransaction::new(&self.allocations)
            .commit(&allocation)
            .map_err(|err| match err {
                AllocationError::NoInventory { vehicle_type, zone } if plan.from_depot => {
                    DispatchError::NoInventoryAtDepot {
                        vehicle_type,
                        depot: zone,
                    }
                }
                AllocationError::NoInventory { vehicle_type, .. } => {
                    DispatchError::NoReachableInventory {
                        vehicle_type,
                        incident: target_code.to_owned(),
                    }
                }
                AllocationError::Conflict { vehicle_type, zone } => {
                    DispatchError::Conflict { vehicle_type, zone }
                }
                AllocationError::Store(source) => DispatchError::Store(source),
            })?;

        let message = format!(
            "{} dispatched from {} {} to {} ({} km)",
            record.vehicle_type,
            if plan.from_depot { "depot" } else { "zone" },
            record.source_code,
            record.dest_code,
            record.distance
        );
        Ok(DispatchOutcome {
            spanning_edges: SpanningForest::views(&graph, forest.restricted_to(target)).collect(),
            record,
            message,
        })
    }

    fn route_from_depot(
        &self,
        graph: &ZoneGraph,
        finder: &PathFinder,
        vehicle: VehicleType,
        target: usize,
    ) -> Result<ShortestPath, DispatchError> {
        let depots: Vec<usize> = graph.depots(vehicle).collect();
        let code = |zone: usize| graph.code(zone).unwrap_or_default().to_owned();
        let unreachable = |from: usize| {
            warn!("{vehicle} depot {} cannot reach {}", code(from), code(target));
            DispatchError::Unreachable {
                from: code(from),
                to: code(target),
            }
        };

        match (self.config.depot_policy, depots.as_slice()) {
            (_, []) => Err(DispatchError::NoDepot {
                vehicle_type: vehicle,
            }),
            (DepotPolicy::Single, &[depot]) => {
                if graph.zone(depot).is_none_or(|zone| zone.available(vehicle) == 0) {
                    return Err(DispatchError::NoInventoryAtDepot {
                        vehicle_type: vehicle,
                        depot: code(depot),
                    });
                }
                finder
                    .shortest_path(depot, target)
                    .ok_or_else(|| unreachable(depot))
            }
            (DepotPolicy::Single, several) => {
                let codes: Vec<String> = several.iter().map(|&zone| code(zone)).collect();
                warn!("{vehicle} has {} depots: {}", codes.len(), codes.join(", "));
                Err(DispatchError::AmbiguousDepot {
                    vehicle_type: vehicle,
                    codes,
                })
            }
            (DepotPolicy::Nearest, &[first, ..]) => {
                let tree = finder
                    .distances_from(target)
                    .ok_or_else(|| unreachable(first))?;
                let distances = &tree;
                let candidates = depots.as_slice();
                let reachable = move || {
                    candidates.iter().filter_map(move |&depot| {
                        distances.distance_to(depot).map(|distance| (depot, distance))
                    })
                };
                let Some(closest) = nearest_of(reachable()) else {
                    return Err(unreachable(first));
                };
                let stocked = nearest_of(reachable().filter(|&(depot, _)| {
                    graph
                        .zone(depot)
                        .is_some_and(|zone| zone.available(vehicle) > 0)
                }));
                let Some(depot) = stocked else {
                    return Err(DispatchError::NoInventoryAtDepot {
                        vehicle_type: vehicle,
                        depot: code(closest),
                    });
                };
                tree.path_to(depot)
                    .map(ShortestPath::reversed)
                    .ok_or_else(|| unreachable(depot))
            }
        }
    }
}

/// Zone with the smallest distance; the first one wins a tie.
fn nearest_of(candidates: impl Iterator<Item = (usize, f64)>) -> Option<usize> {
    candidates
        .min_by(|(_, left), (_, right)| left.total_cmp(right))
        .map(|(zone, _)| zone)
}

/// Route from the closest zone holding `vehicle` to `incident`.
///
/// Equal distances resolve to the zone that comes first in the snapshot.
fn nearest_stocked(
    graph: &ZoneGraph,
    finder: &PathFinder,
    vehicle: VehicleType,
    incident: usize,
) -> Result<ShortestPath, DispatchError> {
    let exhausted = || DispatchError::NoReachableInventory {
        vehicle_type: vehicle,
        incident: graph.code(incident).unwrap_or_default().to_owned(),
    };

    if graph
        .zone(incident)
        .is_some_and(|zone| zone.available(vehicle) > 0)
    {
        return Ok(ShortestPath::stay(incident));
    }

    let tree = finder.distances_from(incident).ok_or_else(exhausted)?;
    let source = nearest_of(
        graph
            .stocked(vehicle)
            .filter_map(|zone| tree.distance_to(zone).map(|distance| (zone, distance))),
    )
    .ok_or_else(exhausted)?;
    tree.path_to(source)
        .map(ShortestPath::reversed)
        .ok_or_else(exhausted)
}
