//! Core domain types and algorithms for the Siren dispatch engine.
//!
//! The engine assigns emergency vehicles held in zones to incoming requests:
//! - [`ZoneGraph`] is a point-in-time snapshot of zones, their inventory and
//!   the weighted links between them.
//! - [`SpanningTreeBuilder`] derives the minimum spanning forest used for
//!   network views. It never decides routes.
//! - [`PathFinder`] computes shortest paths over every edge.
//! - [`AllocationTransaction`] claims one unit and records the dispatch as a
//!   single atomic store operation.
//! - [`DispatchOrchestrator`] ties the pieces together for one request.
//!
//! Persistence sits behind the [`GraphStore`] and [`AllocationStore`]
//! traits; a SQLite implementation ships behind the `store-sqlite` feature.
//!
//! # Examples
//!
//! ```
//! use siren_core::{Edge, PathFinder, SpanningTreeBuilder, Zone, ZoneGraph};
//!
//! let graph = ZoneGraph::new(
//!     vec![
//!         Zone::new("z1", "10001", "Downtown"),
//!         Zone::new("z2", "10002", "Harbour"),
//!         Zone::new("z3", "10003", "Hillside"),
//!     ],
//!     vec![
//!         Edge::new("z1", "z2", 5.0),
//!         Edge::new("z2", "z3", 3.0),
//!         Edge::new("z1", "z3", 10.0),
//!     ],
//! )?;
//!
//! let forest = SpanningTreeBuilder::new(&graph).build();
//! assert_eq!(forest.edges().len(), 2);
//!
//! let route = PathFinder::new(&graph).shortest_path(0, 2).expect("connected");
//! assert_eq!(route.codes(&graph), ["10001", "10002", "10003"]);
//! # Ok::<(), siren_core::GraphError>(())
//! ```

#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod allocation;
mod dispatch;
mod graph;
mod record;
mod routing;
mod spanning;
mod store;
mod vehicle;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod test_support;

pub use allocation::{AllocationError, AllocationRequest, AllocationTransaction};
pub use dispatch::{
    DepotPolicy, DepotPolicyError, DispatchError, DispatchErrorKind, DispatchMode, DispatchOutcome,
    DispatchOrchestrator, DispatchRequest, OrchestratorConfig,
};
pub use graph::{Edge, GraphEdge, GraphError, Zone, ZoneGraph};
pub use record::DispatchRecord;
pub use routing::{PathFinder, ShortestPath, ShortestPathTree};
pub use spanning::{EdgeView, ForestEdge, SpanningForest, SpanningTreeBuilder};
pub use store::{AllocationStore, ClaimOutcome, GraphStore, StoreError, UnitClaim};
pub use vehicle::{DepotFlags, VehicleCounts, VehicleType, VehicleTypeError};

#[cfg(feature = "store-sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "store-sqlite")))]
pub use store::{SqliteDispatchStore, SqliteStoreError};
