//! Facade crate for the Siren dispatch engine.
//!
//! This crate re-exports the core domain types and exposes the SQLite store
//! behind the `store-sqlite` feature.
//!
//! # Examples
//!
//! ```
//! use siren_engine::{DispatchOrchestrator, DispatchRequest, VehicleType};
//! use siren_core::test_support::{MemoryStore, edges, zones};
//!
//! let mut network = zones(&[("A", "Alpha"), ("B", "Bravo"), ("C", "Charlie")]);
//! network[0].inventory.ambulance = 2;
//! network[0].depots.ambulance = true;
//! let store = MemoryStore::new(
//!     network,
//!     edges(&[("A", "B", 5.0), ("B", "C", 3.0), ("A", "C", 10.0)]),
//! );
//!
//! let orchestrator = DispatchOrchestrator::new(&store, &store);
//! let outcome = orchestrator
//!     .dispatch(&DispatchRequest::to_destination(VehicleType::Ambulance, "C"))
//!     .expect("dispatch");
//! assert_eq!(outcome.record.path, ["A", "B", "C"]);
//! assert_eq!(outcome.record.distance, 8.0);
//! assert_eq!(store.available("A", VehicleType::Ambulance), Some(1));
//! ```

#![forbid(unsafe_code)]

pub use siren_core::{
    AllocationError, AllocationRequest, AllocationStore, AllocationTransaction, ClaimOutcome,
    DepotFlags, DepotPolicy, DepotPolicyError, DispatchError, DispatchErrorKind, DispatchMode,
    DispatchOrchestrator, DispatchOutcome, DispatchRecord, DispatchRequest, Edge, EdgeView,
    ForestEdge, GraphEdge, GraphError, GraphStore, OrchestratorConfig, PathFinder, ShortestPath,
    ShortestPathTree, SpanningForest, SpanningTreeBuilder, StoreError, UnitClaim, VehicleCounts,
    VehicleType, VehicleTypeError, Zone, ZoneGraph,
};

#[cfg(feature = "store-sqlite")]
pub use siren_core::{SqliteDispatchStore, SqliteStoreError};
