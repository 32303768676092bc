//! Test-only stores and fixtures shared by unit and behaviour tests.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::{
    AllocationStore, ClaimOutcome, DispatchRecord, Edge, GraphStore, StoreError, UnitClaim,
    VehicleType, Zone, ZoneGraph,
};

#[derive(Debug, Default)]
struct MemoryState {
    zones: Vec<Zone>,
    edges: Vec<Edge>,
    log: Vec<DispatchRecord>,
    fail_claims: bool,
}

/// In-memory store implementing both [`GraphStore`] and
/// [`AllocationStore`].
///
/// Claims run the same "decrement only if positive" predicate as the SQLite
/// store, under a single lock, so concurrent callers observe the same
/// outcomes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create a store holding the given network.
    #[must_use]
    pub fn new(zones: Vec<Zone>, edges: Vec<Edge>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                zones,
                edges,
                ..MemoryState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Units of `vehicle` currently available in the zone with `code`.
    #[must_use]
    pub fn available(&self, code: &str, vehicle: VehicleType) -> Option<u32> {
        self.state()
            .zones
            .iter()
            .find(|zone| zone.code == code)
            .map(|zone| zone.available(vehicle))
    }

    /// Every zone's counter for `vehicle`, in enumeration order.
    #[must_use]
    pub fn counters(&self, vehicle: VehicleType) -> Vec<u32> {
        self.state()
            .zones
            .iter()
            .map(|zone| zone.available(vehicle))
            .collect()
    }

    /// Overwrite the counter for `vehicle` in the zone with `code`.
    pub fn set_available(&self, code: &str, vehicle: VehicleType, count: u32) {
        if let Some(zone) = self.state().zones.iter_mut().find(|zone| zone.code == code) {
            zone.inventory.set(vehicle, count);
        }
    }

    /// Drop every edge touching the zone with `code`.
    pub fn isolate(&self, code: &str) {
        let mut state = self.state();
        let Some(id) = state
            .zones
            .iter()
            .find(|zone| zone.code == code)
            .map(|zone| zone.id.clone())
        else {
            return;
        };
        state
            .edges
            .retain(|edge| edge.source != id && edge.dest != id);
    }

    /// Make every subsequent claim fail with a backend error.
    pub fn fail_claims(&self) {
        self.state().fail_claims = true;
    }

    /// All committed dispatch records, oldest first.
    #[must_use]
    pub fn dispatches(&self) -> Vec<DispatchRecord> {
        self.state().log.clone()
    }
}

impl GraphStore for MemoryStore {
    fn load_graph(&self) -> Result<ZoneGraph, StoreError> {
        let state = self.state();
        Ok(ZoneGraph::new(state.zones.clone(), state.edges.clone())?)
    }
}

impl AllocationStore for MemoryStore {
    fn claim_unit(&self, claim: &UnitClaim<'_>) -> Result<ClaimOutcome, StoreError> {
        let mut state = self.state();
        if state.fail_claims {
            return Err(StoreError::backend(
                "claim unit",
                std::io::Error::other("injected store failure"),
            ));
        }
        let Some(zone) = state
            .zones
            .iter_mut()
            .find(|zone| zone.id == claim.source_zone_id)
        else {
            return Ok(ClaimOutcome::Exhausted);
        };
        if !zone.inventory.take_one(claim.vehicle_type) {
            return Ok(ClaimOutcome::Exhausted);
        }
        let record = DispatchRecord {
            vehicle_type: claim.vehicle_type,
            source_code: claim.source_code.to_owned(),
            dest_code: claim.dest_code.to_owned(),
            path: claim.path.to_vec(),
            distance: claim.distance,
            created_at: Utc::now(),
        };
        state.log.push(record.clone());
        Ok(ClaimOutcome::Claimed(record))
    }

    fn recent_dispatches(&self, limit: usize) -> Result<Vec<DispatchRecord>, StoreError> {
        Ok(self.state().log.iter().rev().take(limit).cloned().collect())
    }
}

/// Build the zone list for a small network from `(code, name)` pairs.
///
/// Zone ids are derived as `zone-{code}`.
#[must_use]
pub fn zones(entries: &[(&str, &str)]) -> Vec<Zone> {
    entries
        .iter()
        .map(|(code, name)| Zone::new(format!("zone-{code}"), *code, *name))
        .collect()
}

/// Build edges between zone codes, using the ids produced by [`zones`].
#[must_use]
pub fn edges(entries: &[(&str, &str, f64)]) -> Vec<Edge> {
    entries
        .iter()
        .map(|(from, to, weight)| Edge::new(format!("zone-{from}"), format!("zone-{to}"), *weight))
        .collect()
}

/// Schema of the dispatch database.
#[cfg(feature = "store-sqlite")]
pub const SQLITE_SCHEMA: &str = "
    CREATE TABLE zones (
        id TEXT PRIMARY KEY,
        code TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        ambulance_count INTEGER NOT NULL DEFAULT 0,
        fire_truck_count INTEGER NOT NULL DEFAULT 0,
        police_count INTEGER NOT NULL DEFAULT 0,
        is_ambulance_depot INTEGER,
        is_fire_truck_depot INTEGER,
        is_police_depot INTEGER
    );
    CREATE TABLE edges (
        id INTEGER PRIMARY KEY,
        source_zone_id TEXT NOT NULL REFERENCES zones (id),
        dest_zone_id TEXT NOT NULL REFERENCES zones (id),
        weight REAL NOT NULL
    );
    CREATE TABLE dispatch_logs (
        id INTEGER PRIMARY KEY,
        vehicle_type TEXT NOT NULL,
        source_zone_code TEXT NOT NULL,
        dest_zone_code TEXT NOT NULL,
        path TEXT NOT NULL,
        distance REAL NOT NULL,
        created_at TEXT NOT NULL
    );
";

/// Create a dispatch database at `path` holding the given network.
///
/// # Errors
///
/// Returns the underlying SQLite error when the file cannot be created or
/// written.
#[cfg(feature = "store-sqlite")]
pub fn write_sqlite_network(
    path: &std::path::Path,
    zones: &[Zone],
    edges: &[Edge],
) -> Result<(), rusqlite::Error> {
    use rusqlite::{Connection, params};

    let mut connection = Connection::open(path)?;
    let tx = connection.transaction()?;
    tx.execute_batch(SQLITE_SCHEMA)?;
    for zone in zones {
        tx.execute(
            "INSERT INTO zones (id, code, name, ambulance_count, fire_truck_count, police_count, \
             is_ambulance_depot, is_fire_truck_depot, is_police_depot) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                zone.id,
                zone.code,
                zone.name,
                zone.inventory.ambulance,
                zone.inventory.fire_truck,
                zone.inventory.police,
                zone.depots.ambulance,
                zone.depots.fire_truck,
                zone.depots.police,
            ],
        )?;
    }
    for edge in edges {
        tx.execute(
            "INSERT INTO edges (source_zone_id, dest_zone_id, weight) VALUES (?1, ?2, ?3)",
            params![edge.source, edge.dest, edge.weight],
        )?;
    }
    tx.commit()
}
