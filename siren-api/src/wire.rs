//! JSON shapes exchanged over HTTP.
//!
//! Field names follow the dispatch console's camelCase contract.

use serde::{Deserialize, Serialize};
use siren_core::{
    DepotFlags, DispatchOutcome, DispatchRequest, EdgeView, SpanningForest, SpanningTreeBuilder,
    VehicleCounts, VehicleType, VehicleTypeError, Zone, ZoneGraph,
};
use thiserror::Error;

/// Body of `POST /dispatch`.
///
/// Exactly one of `destination_zone_code` (depot-anchored) and
/// `source_zone_code` (nearest available) must be present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchBody {
    /// Destination zone for a depot-anchored dispatch.
    #[serde(default, alias = "destinationZipCode")]
    pub destination_zone_code: Option<String>,
    /// Incident zone for a nearest-available dispatch.
    #[serde(default)]
    pub source_zone_code: Option<String>,
    /// Requested vehicle type name.
    pub vehicle_type: String,
}

/// Reasons a [`DispatchBody`] is rejected before any lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Both target fields were supplied.
    #[error("provide either destinationZoneCode or sourceZoneCode, not both")]
    AmbiguousTarget,
    /// Neither target field was supplied.
    #[error("destinationZoneCode or sourceZoneCode is required")]
    MissingTarget,
    /// A zone code was blank.
    #[error("{field} must not be empty")]
    EmptyCode {
        /// Wire name of the offending field.
        field: &'static str,
    },
    /// The vehicle type is not recognised.
    #[error(transparent)]
    VehicleType(#[from] VehicleTypeError),
}

impl DispatchBody {
    /// Validate the body into a core request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when the target fields are missing, doubled
    /// or blank, or when the vehicle type is unknown.
    pub fn into_request(self) -> Result<DispatchRequest, RequestError> {
        let vehicle_type: VehicleType = self.vehicle_type.trim().parse()?;
        match (self.destination_zone_code, self.source_zone_code) {
            (Some(_), Some(_)) => Err(RequestError::AmbiguousTarget),
            (None, None) => Err(RequestError::MissingTarget),
            (Some(destination), None) => {
                let code = non_empty(destination, "destinationZoneCode")?;
                Ok(DispatchRequest::to_destination(vehicle_type, code))
            }
            (None, Some(incident)) => {
                let code = non_empty(incident, "sourceZoneCode")?;
                Ok(DispatchRequest::for_incident(vehicle_type, code))
            }
        }
    }
}

fn non_empty(code: String, field: &'static str) -> Result<String, RequestError> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        Err(RequestError::EmptyCode { field })
    } else {
        Ok(trimmed.to_owned())
    }
}

/// Success envelope for `POST /dispatch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResponse {
    /// Always `true`.
    pub success: bool,
    /// Always `true`; kept for console compatibility.
    pub dispatched: bool,
    /// Vehicle type dispatched.
    pub vehicle_type: VehicleType,
    /// Zone the unit left from.
    pub source_zip_code: String,
    /// Zone the unit travels to.
    pub dest_zip_code: String,
    /// Zone codes from source to destination.
    pub path: Vec<String>,
    /// Route length in kilometres.
    pub distance: f64,
    /// Spanning forest of the destination's component. Display only.
    pub mst_edges: Vec<EdgeView>,
    /// Human-readable summary.
    pub message: String,
}

impl From<DispatchOutcome> for DispatchResponse {
    fn from(outcome: DispatchOutcome) -> Self {
        let DispatchOutcome {
            record,
            spanning_edges,
            message,
        } = outcome;
        Self {
            success: true,
            dispatched: true,
            vehicle_type: record.vehicle_type,
            source_zip_code: record.source_code,
            dest_zip_code: record.dest_code,
            path: record.path,
            distance: record.distance,
            mst_edges: spanning_edges,
            message,
        }
    }
}

/// Failure envelope shared by every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// Human-readable reason.
    pub error: String,
}

impl ErrorBody {
    /// Envelope carrying `error`.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// One row of `GET /zones`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSummary {
    /// Zone code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Units stationed in the zone.
    pub inventory: VehicleCounts,
    /// Depot designations.
    pub depots: DepotFlags,
}

impl From<&Zone> for ZoneSummary {
    fn from(zone: &Zone) -> Self {
        Self {
            code: zone.code.clone(),
            name: zone.name.clone(),
            inventory: zone.inventory,
            depots: zone.depots,
        }
    }
}

/// Zones of a snapshot ordered by code.
pub fn zone_summaries(graph: &ZoneGraph) -> Vec<ZoneSummary> {
    let mut zones: Vec<ZoneSummary> = graph.zones().iter().map(ZoneSummary::from).collect();
    zones.sort_by(|left, right| left.code.cmp(&right.code));
    zones
}

/// Body of `GET /fleet`: units available network-wide per vehicle type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetSummary {
    /// Available ambulances.
    pub ambulance: u64,
    /// Available fire trucks.
    pub fire_truck: u64,
    /// Available police units.
    pub police: u64,
}

impl From<&ZoneGraph> for FleetSummary {
    fn from(graph: &ZoneGraph) -> Self {
        Self {
            ambulance: graph.fleet_total(VehicleType::Ambulance),
            fire_truck: graph.fleet_total(VehicleType::FireTruck),
            police: graph.fleet_total(VehicleType::Police),
        }
    }
}

/// Body of `GET /network`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkView {
    /// Zone codes in snapshot order.
    pub zones: Vec<String>,
    /// Every edge, by zone code.
    pub edges: Vec<EdgeView>,
    /// Spanning forest across all components.
    pub mst_edges: Vec<EdgeView>,
    /// Number of connected components.
    pub component_count: usize,
}

impl From<&ZoneGraph> for NetworkView {
    fn from(graph: &ZoneGraph) -> Self {
        let forest = SpanningTreeBuilder::new(graph).build();
        let edges = graph
            .edges()
            .iter()
            .filter_map(|edge| {
                Some(EdgeView {
                    source: graph.code(edge.from)?.to_owned(),
                    dest: graph.code(edge.to)?.to_owned(),
                    weight: edge.weight,
                })
            })
            .collect();
        Self {
            zones: graph.zones().iter().map(|zone| zone.code.clone()).collect(),
            edges,
            mst_edges: SpanningForest::views(graph, forest.edges()).collect(),
            component_count: forest.component_count(),
        }
    }
}

/// Query string of `GET /dispatches`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct HistoryQuery {
    /// Maximum records to return.
    pub limit: Option<usize>,
}
