//! Zones, edges and the point-in-time network snapshot the engine routes over.
//!
//! Zones are addressed by dense `usize` indices inside a [`ZoneGraph`]; the
//! string identifiers and human codes used by stores and callers are mapped
//! at the boundary.

use std::collections::HashMap;

use thiserror::Error;

use crate::{DepotFlags, VehicleCounts, VehicleType};

/// A geographic area holding its own vehicle inventory.
///
/// # Examples
///
/// ```
/// use siren_core::{VehicleType, Zone};
///
/// let zone = Zone::new("z1", "10001", "Downtown")
///     .with_inventory(VehicleType::Ambulance, 3)
///     .with_depot(VehicleType::Ambulance);
/// assert_eq!(zone.available(VehicleType::Ambulance), 3);
/// assert!(zone.is_depot(VehicleType::Ambulance));
/// assert!(!zone.is_depot(VehicleType::Police));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Zone {
    /// Store identity referenced by edges.
    pub id: String,
    /// Human-facing zone code, unique across the network.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Units currently available in the zone.
    pub inventory: VehicleCounts,
    /// Depot designation per vehicle type.
    pub depots: DepotFlags,
}

impl Zone {
    /// Create a zone with no inventory and no depot flags.
    pub fn new(id: impl Into<String>, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            name: name.into(),
            inventory: VehicleCounts::default(),
            depots: DepotFlags::default(),
        }
    }

    /// Set the available count for `vehicle`.
    #[must_use]
    pub const fn with_inventory(mut self, vehicle: VehicleType, count: u32) -> Self {
        self.inventory.set(vehicle, count);
        self
    }

    /// Flag the zone as the depot for `vehicle`.
    #[must_use]
    pub const fn with_depot(mut self, vehicle: VehicleType) -> Self {
        self.depots.set(vehicle, true);
        self
    }

    /// Units of `vehicle` available in this zone.
    #[must_use]
    pub const fn available(&self, vehicle: VehicleType) -> u32 {
        self.inventory.get(vehicle)
    }

    /// Whether this zone is flagged as a depot for `vehicle`.
    #[must_use]
    pub const fn is_depot(&self, vehicle: VehicleType) -> bool {
        self.depots.is_depot(vehicle)
    }
}

/// Undirected link between two zones, weighted by travel distance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Edge {
    /// Identifier of one endpoint zone.
    pub source: String,
    /// Identifier of the other endpoint zone.
    pub dest: String,
    /// Travel distance; must be finite and non-negative.
    pub weight: f64,
}

impl Edge {
    /// Create an edge between two zone identifiers.
    ///
    /// Weights are validated when the edge joins a [`ZoneGraph`].
    pub fn new(source: impl Into<String>, dest: impl Into<String>, weight: f64) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            weight,
        }
    }
}

/// An edge with endpoints resolved to dense zone indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphEdge {
    /// Index of the first endpoint.
    pub from: usize,
    /// Index of the second endpoint.
    pub to: usize,
    /// Travel distance.
    pub weight: f64,
}

/// Errors raised when a network snapshot is inconsistent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// Two zones share a store identifier.
    #[error("zone id {id:?} appears more than once")]
    DuplicateZoneId {
        /// The repeated identifier.
        id: String,
    },
    /// Two zones share a human code.
    #[error("zone code {code:?} appears more than once")]
    DuplicateZoneCode {
        /// The repeated code.
        code: String,
    },
    /// An edge references a zone that is not part of the snapshot.
    #[error("edge {position} references unknown zone {zone_id:?}")]
    UnknownEndpoint {
        /// Position of the edge in the input list.
        position: usize,
        /// The dangling zone identifier.
        zone_id: String,
    },
    /// An edge weight is negative, NaN or infinite.
    #[error("edge {position} between {from:?} and {to:?} has invalid weight {weight}")]
    InvalidWeight {
        /// Position of the edge in the input list.
        position: usize,
        /// First endpoint identifier.
        from: String,
        /// Second endpoint identifier.
        to: String,
        /// The rejected weight.
        weight: f64,
    },
}

/// Point-in-time snapshot of the zone network.
///
/// Zone order is the enumeration order supplied by the store; it is the
/// tie-break order used wherever several zones are equally good.
///
/// # Examples
///
/// ```
/// use siren_core::{Edge, Zone, ZoneGraph};
///
/// let graph = ZoneGraph::new(
///     vec![Zone::new("a", "A", "Alpha"), Zone::new("b", "B", "Bravo")],
///     vec![Edge::new("a", "b", 2.5)],
/// )?;
/// assert_eq!(graph.index_of("B"), Some(1));
/// assert_eq!(graph.edges()[0].weight, 2.5);
/// # Ok::<(), siren_core::GraphError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ZoneGraph {
    zones: Vec<Zone>,
    edges: Vec<GraphEdge>,
    by_code: HashMap<String, usize>,
}

impl ZoneGraph {
    /// Validate zones and edges and build the dense representation.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] when ids or codes repeat, when an edge names
    /// an unknown zone, or when a weight is not a finite non-negative number.
    pub fn new(zones: Vec<Zone>, edges: Vec<Edge>) -> Result<Self, GraphError> {
        let mut by_id = HashMap::with_capacity(zones.len());
        let mut by_code = HashMap::with_capacity(zones.len());
        for (index, zone) in zones.iter().enumerate() {
            if by_id.insert(zone.id.as_str(), index).is_some() {
                return Err(GraphError::DuplicateZoneId {
                    id: zone.id.clone(),
                });
            }
            if by_code.insert(zone.code.clone(), index).is_some() {
                return Err(GraphError::DuplicateZoneCode {
                    code: zone.code.clone(),
                });
            }
        }

        let resolved = edges
            .into_iter()
            .enumerate()
            .map(|(position, edge)| {
                if !edge.weight.is_finite() || edge.weight < 0.0 {
                    return Err(GraphError::InvalidWeight {
                        position,
                        from: edge.source,
                        to: edge.dest,
                        weight: edge.weight,
                    });
                }
                let endpoint = |zone_id: &str| {
                    by_id
                        .get(zone_id)
                        .copied()
                        .ok_or_else(|| GraphError::UnknownEndpoint {
                            position,
                            zone_id: zone_id.to_owned(),
                        })
                };
                Ok(GraphEdge {
                    from: endpoint(&edge.source)?,
                    to: endpoint(&edge.dest)?,
                    weight: edge.weight,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            zones,
            edges: resolved,
            by_code,
        })
    }

    /// All zones in enumeration order.
    #[must_use]
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// All edges with resolved endpoints, in input order.
    #[must_use]
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Number of zones in the snapshot.
    #[must_use]
    pub const fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Zone at a dense index.
    #[must_use]
    pub fn zone(&self, index: usize) -> Option<&Zone> {
        self.zones.get(index)
    }

    /// Dense index of the zone with the given code.
    #[must_use]
    pub fn index_of(&self, code: &str) -> Option<usize> {
        self.by_code.get(code).copied()
    }

    /// Zone with the given code.
    #[must_use]
    pub fn zone_by_code(&self, code: &str) -> Option<&Zone> {
        self.index_of(code).and_then(|index| self.zone(index))
    }

    /// Code of the zone at a dense index.
    #[must_use]
    pub fn code(&self, index: usize) -> Option<&str> {
        self.zone(index).map(|zone| zone.code.as_str())
    }

    /// Indices of zones flagged as depot for `vehicle`, in enumeration order.
    pub fn depots(&self, vehicle: VehicleType) -> impl Iterator<Item = usize> + '_ {
        self.zones
            .iter()
            .enumerate()
            .filter(move |(_, zone)| zone.is_depot(vehicle))
            .map(|(index, _)| index)
    }

    /// Indices of zones with at least one unit of `vehicle`, in enumeration
    /// order.
    pub fn stocked(&self, vehicle: VehicleType) -> impl Iterator<Item = usize> + '_ {
        self.zones
            .iter()
            .enumerate()
            .filter(move |(_, zone)| zone.available(vehicle) > 0)
            .map(|(index, _)| index)
    }

    /// Total units of `vehicle` available across the network.
    #[must_use]
    pub fn fleet_total(&self, vehicle: VehicleType) -> u64 {
        self.zones
            .iter()
            .map(|zone| u64::from(zone.available(vehicle)))
            .sum()
    }
}
