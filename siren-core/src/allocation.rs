//! Atomic claim of one unit of inventory paired with its dispatch record.

use log::{info, warn};
use thiserror::Error;

use crate::{
    AllocationStore, ClaimOutcome, DispatchRecord, ShortestPath, StoreError, UnitClaim,
    VehicleType, ZoneGraph,
};

/// Errors returned by [`AllocationTransaction::commit`].
#[derive(Debug, Error)]
pub enum AllocationError {
    /// The source zone had no unit when the snapshot was taken.
    #[error("no {vehicle_type} available in zone {zone}")]
    NoInventory {
        /// Vehicle type requested.
        vehicle_type: VehicleType,
        /// Code of the source zone.
        zone: String,
    },
    /// A unit was visible in the snapshot but a concurrent dispatch claimed
    /// it first.
    #[error("the last {vehicle_type} in zone {zone} was claimed by a concurrent dispatch")]
    Conflict {
        /// Vehicle type requested.
        vehicle_type: VehicleType,
        /// Code of the source zone.
        zone: String,
    },
    /// The store failed; nothing was applied.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything needed to claim a unit along a computed route.
///
/// Built from a [`ShortestPath`], so the path always starts at the source
/// zone, ends at the destination and holds at least one code.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationRequest {
    vehicle_type: VehicleType,
    source_zone_id: String,
    source_code: String,
    dest_code: String,
    path: Vec<String>,
    distance: f64,
    observed: u32,
}

impl AllocationRequest {
    /// Prepare a claim of `vehicle` at the first zone of `route`.
    ///
    /// The source counter seen in `graph` is remembered so a failed claim
    /// can be told apart as a lost race or plain exhaustion. Returns `None`
    /// when the route names zones outside the snapshot.
    #[must_use]
    pub fn new(graph: &ZoneGraph, vehicle: VehicleType, route: &ShortestPath) -> Option<Self> {
        let source = graph.zone(route.source()?)?;
        let dest_code = graph.code(route.target()?)?.to_owned();
        let path = route.codes(graph);
        if path.len() != route.zones().len() {
            return None;
        }
        Some(Self {
            vehicle_type: vehicle,
            source_zone_id: source.id.clone(),
            source_code: source.code.clone(),
            dest_code,
            path,
            distance: route.distance(),
            observed: source.available(vehicle),
        })
    }

    /// Code of the zone the unit leaves from.
    #[must_use]
    pub fn source_code(&self) -> &str {
        &self.source_code
    }

    /// Code of the destination zone.
    #[must_use]
    pub fn dest_code(&self) -> &str {
        &self.dest_code
    }

    fn claim(&self) -> UnitClaim<'_> {
        UnitClaim {
            vehicle_type: self.vehicle_type,
            source_zone_id: &self.source_zone_id,
            source_code: &self.source_code,
            dest_code: &self.dest_code,
            path: &self.path,
            distance: self.distance,
        }
    }
}

/// Commits allocations through an [`AllocationStore`].
///
/// The transaction never reads the counter itself: the conditional
/// decrement and the log append happen in one store call.
#[derive(Debug, Clone, Copy)]
pub struct AllocationTransaction<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S: AllocationStore + ?Sized> AllocationTransaction<'s, S> {
    /// Bind a transaction to `store`.
    #[must_use]
    pub const fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Claim one unit and persist the dispatch record.
    ///
    /// # Errors
    ///
    /// [`AllocationError::NoInventory`] when the snapshot already showed an
    /// empty counter, [`AllocationError::Conflict`] when it showed a unit
    /// that another dispatch took first, and [`AllocationError::Store`]
    /// when the store failed. None of them leave a change behind.
    pub fn commit(&self, request: &AllocationRequest) -> Result<DispatchRecord, AllocationError> {
        match self.store.claim_unit(&request.claim())? {
            ClaimOutcome::Claimed(record) => {
                info!(
                    "dispatched {} from {} to {} via {} zone(s), {} km",
                    record.vehicle_type,
                    record.source_code,
                    record.dest_code,
                    record.path.len(),
                    record.distance
                );
                Ok(record)
            }
            ClaimOutcome::Exhausted if request.observed > 0 => {
                warn!(
                    "lost the race for {} at {}",
                    request.vehicle_type, request.source_code
                );
                Err(AllocationError::Conflict {
                    vehicle_type: request.vehicle_type,
                    zone: request.source_code.clone(),
                })
            }
            ClaimOutcome::Exhausted => Err(AllocationError::NoInventory {
                vehicle_type: request.vehicle_type,
                zone: request.source_code.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        GraphStore, PathFinder,
        test_support::{MemoryStore, edges, zones},
    };
    use rstest::{fixture, rstest};

    #[fixture]
    fn store() -> MemoryStore {
        let mut network = zones(&[("A", "Alpha"), ("B", "Bravo"), ("C", "Charlie")]);
        if let Some(zone) = network.first_mut() {
            zone.inventory.ambulance = 1;
        }
        MemoryStore::new(
            network,
            edges(&[("A", "B", 5.0), ("B", "C", 3.0), ("A", "C", 10.0)]),
        )
    }

    fn request(store: &MemoryStore, from: usize, to: usize) -> AllocationRequest {
        let graph = store.load_graph().expect("graph");
        let route = PathFinder::new(&graph)
            .shortest_path(from, to)
            .expect("reachable");
        AllocationRequest::new(&graph, VehicleType::Ambulance, &route).expect("valid route")
    }

    #[rstest]
    fn commits_record_along_the_route(store: MemoryStore) {
        let request = request(&store, 0, 2);
        let record = AllocationTransaction::new(&store)
            .commit(&request)
            .expect("commit");
        assert_eq!(record.path, ["A", "B", "C"]);
        assert_eq!(record.distance, 8.0);
        assert_eq!(store.available("A", VehicleType::Ambulance), Some(0));
        assert_eq!(store.dispatches(), vec![record]);
    }

    #[rstest]
    fn same_zone_dispatch_has_single_code_path(store: MemoryStore) {
        let request = request(&store, 0, 0);
        let record = AllocationTransaction::new(&store)
            .commit(&request)
            .expect("commit");
        assert_eq!(record.path, ["A"]);
        assert_eq!(record.distance, 0.0);
        assert!(record.is_local());
    }

    #[rstest]
    fn stale_snapshot_reports_conflict(store: MemoryStore) {
        let request = request(&store, 0, 1);
        store.set_available("A", VehicleType::Ambulance, 0);
        let err = AllocationTransaction::new(&store)
            .commit(&request)
            .expect_err("lost race");
        assert!(matches!(err, AllocationError::Conflict { .. }));
        assert!(store.dispatches().is_empty());
    }

    #[rstest]
    fn empty_counter_reports_no_inventory(store: MemoryStore) {
        let request = request(&store, 1, 2);
        let err = AllocationTransaction::new(&store)
            .commit(&request)
            .expect_err("nothing to claim");
        assert!(matches!(err, AllocationError::NoInventory { ref zone, .. } if zone == "B"));
        assert_eq!(store.counters(VehicleType::Ambulance), vec![1, 0, 0]);
    }

    #[rstest]
    fn store_failure_leaves_state_unchanged(store: MemoryStore) {
        let request = request(&store, 0, 2);
        store.fail_claims();
        let err = AllocationTransaction::new(&store)
            .commit(&request)
            .expect_err("store failure");
        assert!(matches!(err, AllocationError::Store(_)));
        assert_eq!(store.available("A", VehicleType::Ambulance), Some(1));
        assert!(store.dispatches().is_empty());
    }

    #[rstest]
    fn request_exposes_route_endpoints(store: MemoryStore) {
        let request = request(&store, 2, 0);
        assert_eq!(request.source_code(), "C");
        assert_eq!(request.dest_code(), "A");
    }
}
