//! Persistence traits consumed by the dispatch engine.
//!
//! [`GraphStore`] hands out a point-in-time [`ZoneGraph`] snapshot.
//! [`AllocationStore`] owns the only write the engine performs: claiming one
//! unit of inventory and appending the matching [`DispatchRecord`] as a
//! single atomic step.

use std::{error::Error as StdError, sync::Arc};

use thiserror::Error;

use crate::{DispatchRecord, GraphError, VehicleType, ZoneGraph};

#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqliteDispatchStore, SqliteStoreError};

/// Errors surfaced by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store failed; nothing was applied.
    #[error("store operation `{operation}` failed: {source}")]
    Backend {
        /// Short label of the failed operation.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    /// A persisted row could not be decoded.
    #[error("corrupt row in `{table}`: {reason}")]
    CorruptRow {
        /// Table holding the row.
        table: &'static str,
        /// What was wrong with it.
        reason: String,
    },
    /// The persisted zones and edges do not form a valid network.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl StoreError {
    /// Wrap a backend failure with the operation it interrupted.
    pub fn backend<E>(operation: &'static str, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Backend {
            operation,
            source: Box::new(source),
        }
    }
}

/// Read access to the zone network.
pub trait GraphStore {
    /// Load every zone and edge as one snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be read or its contents
    /// do not form a valid [`ZoneGraph`].
    fn load_graph(&self) -> Result<ZoneGraph, StoreError>;
}

/// A request to take one unit out of a zone and log the dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitClaim<'a> {
    /// Vehicle type to claim.
    pub vehicle_type: VehicleType,
    /// Store identity of the zone giving up the unit.
    pub source_zone_id: &'a str,
    /// Code of the zone giving up the unit.
    pub source_code: &'a str,
    /// Code of the destination zone.
    pub dest_code: &'a str,
    /// Zone codes from source to destination inclusive.
    pub path: &'a [String],
    /// Route length.
    pub distance: f64,
}

/// Result of a [`UnitClaim`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// The counter was decremented and the record appended.
    Claimed(DispatchRecord),
    /// The counter was already zero; nothing changed.
    Exhausted,
}

/// Inventory claims and dispatch log access.
///
/// `claim_unit` must be atomic: the conditional decrement and the log
/// append both apply or neither does, and the counter never goes below
/// zero regardless of how many callers race on it.
pub trait AllocationStore {
    /// Decrement the counter if it is positive and append the dispatch
    /// record in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the transaction fails; no partial change
    /// is left behind.
    fn claim_unit(&self, claim: &UnitClaim<'_>) -> Result<ClaimOutcome, StoreError>;

    /// Up to `limit` dispatch records, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the log cannot be read or decoded.
    fn recent_dispatches(&self, limit: usize) -> Result<Vec<DispatchRecord>, StoreError>;
}

impl<T: GraphStore + ?Sized> GraphStore for &T {
    fn load_graph(&self) -> Result<ZoneGraph, StoreError> {
        (**self).load_graph()
    }
}

impl<T: GraphStore + ?Sized> GraphStore for Arc<T> {
    fn load_graph(&self) -> Result<ZoneGraph, StoreError> {
        (**self).load_graph()
    }
}

impl<T: AllocationStore + ?Sized> AllocationStore for &T {
    fn claim_unit(&self, claim: &UnitClaim<'_>) -> Result<ClaimOutcome, StoreError> {
        (**self).claim_unit(claim)
    }

    fn recent_dispatches(&self, limit: usize) -> Result<Vec<DispatchRecord>, StoreError> {
        (**self).recent_dispatches(limit)
    }
}

impl<T: AllocationStore + ?Sized> AllocationStore for Arc<T> {
    fn claim_unit(&self, claim: &UnitClaim<'_>) -> Result<ClaimOutcome, StoreError> {
        (**self).claim_unit(claim)
    }

    fn recent_dispatches(&self, limit: usize) -> Result<Vec<DispatchRecord>, StoreError> {
        (**self).recent_dispatches(limit)
    }
}
