//! SQLite-backed zone network and dispatch log.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, warn};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, TransactionBehavior, params};
use thiserror::Error;

use crate::{DepotFlags, DispatchRecord, Edge, VehicleCounts, VehicleType, Zone, ZoneGraph};

use super::{AllocationStore, ClaimOutcome, GraphStore, StoreError, UnitClaim};

/// Tables the store reads and writes. Schema management lives outside the
/// engine.
const REQUIRED_TABLES: [&str; 3] = ["zones", "edges", "dispatch_logs"];

/// How long a writer waits for another connection's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Error raised when opening a dispatch database.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}: {source}")]
    OpenDatabase {
        /// Location of the SQLite database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// The database lacks a table the engine depends on.
    #[error("SQLite database at {path} has no `{table}` table")]
    MissingTable {
        /// Location of the SQLite database on disk.
        path: PathBuf,
        /// Name of the missing table.
        table: &'static str,
    },
    /// Generic SQLite error while preparing the connection.
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

impl From<SqliteStoreError> for StoreError {
    fn from(source: SqliteStoreError) -> Self {
        Self::backend("open database", source)
    }
}

/// Zone network and dispatch log persisted in one SQLite database.
///
/// Claims run inside `BEGIN IMMEDIATE` transactions, so several stores
/// opened on the same file (or several processes) serialise their writes
/// through SQLite's own locking.
pub struct SqliteDispatchStore {
    path: PathBuf,
    connection: Mutex<Connection>,
}

impl fmt::Debug for SqliteDispatchStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDispatchStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteDispatchStore {
    /// Open an existing, provisioned dispatch database.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be opened read-write or when one of the
    /// `zones`, `edges` or `dispatch_logs` tables is absent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SqliteStoreError> {
        let path = path.as_ref();
        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| SqliteStoreError::OpenDatabase {
            path: path.to_path_buf(),
            source,
        })?;
        connection.busy_timeout(BUSY_TIMEOUT)?;

        for table in REQUIRED_TABLES {
            let found: Option<String> = connection
                .query_row(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    params![table],
                    |row| row.get(0),
                )
                .optional()?;
            if found.is_none() {
                return Err(SqliteStoreError::MissingTable {
                    path: path.to_path_buf(),
                    table,
                });
            }
        }

        debug!("opened dispatch database at {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            connection: Mutex::new(connection),
        })
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // A poisoned lock only means another thread panicked mid-call; any
    // transaction it held was rolled back when dropped.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

const fn counter_column(vehicle: VehicleType) -> &'static str {
    match vehicle {
        VehicleType::Ambulance => "ambulance_count",
        VehicleType::FireTruck => "fire_truck_count",
        VehicleType::Police => "police_count",
    }
}

fn count_from(value: i64, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::CorruptRow {
        table: "zones",
        reason: format!("{column} holds {value}, expected a non-negative count"),
    })
}

fn zone_from_row(row: &Row<'_>) -> Result<Zone, StoreError> {
    let read = |source: rusqlite::Error| StoreError::backend("read zones", source);
    let ambulance: i64 = row.get(3).map_err(read)?;
    let fire_truck: i64 = row.get(4).map_err(read)?;
    let police: i64 = row.get(5).map_err(read)?;
    let depots = DepotFlags {
        ambulance: row.get::<_, Option<bool>>(6).map_err(read)?.unwrap_or(false),
        fire_truck: row.get::<_, Option<bool>>(7).map_err(read)?.unwrap_or(false),
        police: row.get::<_, Option<bool>>(8).map_err(read)?.unwrap_or(false),
    };
    Ok(Zone {
        id: row.get(0).map_err(read)?,
        code: row.get(1).map_err(read)?,
        name: row.get(2).map_err(read)?,
        inventory: VehicleCounts {
            ambulance: count_from(ambulance, "ambulance_count")?,
            fire_truck: count_from(fire_truck, "fire_truck_count")?,
            police: count_from(police, "police_count")?,
        },
        depots,
    })
}

fn record_from_row(row: &Row<'_>) -> Result<DispatchRecord, StoreError> {
    let read = |source: rusqlite::Error| StoreError::backend("read dispatch log", source);
    let corrupt = |reason: String| StoreError::CorruptRow {
        table: "dispatch_logs",
        reason,
    };

    let vehicle: String = row.get(0).map_err(read)?;
    let path: String = row.get(3).map_err(read)?;
    let created_at: String = row.get(5).map_err(read)?;
    Ok(DispatchRecord {
        vehicle_type: vehicle
            .parse::<VehicleType>()
            .map_err(|err| corrupt(format!("{err}")))?,
        source_code: row.get(1).map_err(read)?,
        dest_code: row.get(2).map_err(read)?,
        path: serde_json::from_str(&path)
            .map_err(|err| corrupt(format!("path is not a JSON list of codes: {err}")))?,
        distance: row.get(4).map_err(read)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|err| corrupt(format!("created_at {created_at:?}: {err}")))?
            .with_timezone(&Utc),
    })
}

impl GraphStore for SqliteDispatchStore {
    fn load_graph(&self) -> Result<ZoneGraph, StoreError> {
        let read = |source: rusqlite::Error| StoreError::backend("load graph", source);
        let mut connection = self.lock();
        // One read transaction keeps zones and edges consistent.
        let tx = connection.transaction().map_err(read)?;

        let zones = {
            let mut statement = tx
                .prepare(
                    "SELECT id, code, name, ambulance_count, fire_truck_count, police_count, \
                     is_ambulance_depot, is_fire_truck_depot, is_police_depot \
                     FROM zones ORDER BY rowid",
                )
                .map_err(read)?;
            let mut rows = statement.query([]).map_err(read)?;
            let mut zones = Vec::new();
            while let Some(row) = rows.next().map_err(read)? {
                zones.push(zone_from_row(row)?);
            }
            zones
        };

        let edges = {
            let mut statement = tx
                .prepare("SELECT source_zone_id, dest_zone_id, weight FROM edges ORDER BY rowid")
                .map_err(read)?;
            let rows = statement
                .query_map([], |row| {
                    Ok(Edge::new(
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                    ))
                })
                .map_err(read)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(read)?
        };

        tx.commit().map_err(read)?;
        debug!("loaded {} zones and {} edges", zones.len(), edges.len());
        Ok(ZoneGraph::new(zones, edges)?)
    }
}

impl AllocationStore for SqliteDispatchStore {
    fn claim_unit(&self, claim: &UnitClaim<'_>) -> Result<ClaimOutcome, StoreError> {
        let write = |source: rusqlite::Error| StoreError::backend("claim unit", source);
        let mut connection = self.lock();
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(write)?;

        let column = counter_column(claim.vehicle_type);
        let changed = tx
            .execute(
                &format!("UPDATE zones SET {column} = {column} - 1 WHERE id = ?1 AND {column} > 0"),
                params![claim.source_zone_id],
            )
            .map_err(write)?;
        if changed != 1 {
            // Dropping the transaction rolls it back.
            debug!(
                "no {} left in zone {}",
                claim.vehicle_type, claim.source_code
            );
            return Ok(ClaimOutcome::Exhausted);
        }

        let path = serde_json::to_string(claim.path)
            .map_err(|source| StoreError::backend("encode path", source))?;
        let created_at = Utc::now();
        tx.execute(
            "INSERT INTO dispatch_logs \
             (vehicle_type, source_zone_code, dest_zone_code, path, distance, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                claim.vehicle_type.as_str(),
                claim.source_code,
                claim.dest_code,
                path,
                claim.distance,
                created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )
        .map_err(|source| {
            warn!(
                "dispatch log append failed for {} from {}; rolling back",
                claim.vehicle_type, claim.source_code
            );
            write(source)
        })?;
        tx.commit().map_err(write)?;

        Ok(ClaimOutcome::Claimed(DispatchRecord {
            vehicle_type: claim.vehicle_type,
            source_code: claim.source_code.to_owned(),
            dest_code: claim.dest_code.to_owned(),
            path: claim.path.to_vec(),
            distance: claim.distance,
            created_at,
        }))
    }

    fn recent_dispatches(&self, limit: usize) -> Result<Vec<DispatchRecord>, StoreError> {
        let read = |source: rusqlite::Error| StoreError::backend("read dispatch log", source);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let connection = self.lock();
        let mut statement = connection
            .prepare(
                "SELECT vehicle_type, source_zone_code, dest_zone_code, path, distance, created_at \
                 FROM dispatch_logs ORDER BY created_at DESC, id DESC LIMIT ?1",
            )
            .map_err(read)?;
        let mut rows = statement.query(params![limit]).map_err(read)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(read)? {
            records.push(record_from_row(row)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_sqlite_network;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    fn network() -> (Vec<Zone>, Vec<Edge>) {
        (
            vec![
                Zone::new("z-a", "A", "Alpha")
                    .with_inventory(VehicleType::Ambulance, 2)
                    .with_depot(VehicleType::Ambulance),
                Zone::new("z-b", "B", "Bravo").with_inventory(VehicleType::Police, 1),
                Zone::new("z-c", "C", "Charlie"),
            ],
            vec![
                Edge::new("z-a", "z-b", 5.0),
                Edge::new("z-b", "z-c", 3.0),
                Edge::new("z-a", "z-c", 10.0),
            ],
        )
    }

    #[fixture]
    fn database() -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("dispatch.db");
        let (zones, edges) = network();
        write_sqlite_network(&path, &zones, &edges).expect("persist network");
        (dir, path)
    }

    fn claim<'a>(
        vehicle: VehicleType,
        zone: &'a str,
        code: &'a str,
        path: &'a [String],
    ) -> UnitClaim<'a> {
        UnitClaim {
            vehicle_type: vehicle,
            source_zone_id: zone,
            source_code: code,
            dest_code: path.last().map_or(code, String::as_str),
            path,
            distance: 5.0,
        }
    }

    fn codes(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[rstest]
    fn loads_zones_in_insertion_order(database: (TempDir, PathBuf)) {
        let (_dir, path) = database;
        let store = SqliteDispatchStore::open(&path).expect("open store");
        let graph = store.load_graph().expect("load graph");
        let loaded: Vec<_> = graph.zones().iter().map(|zone| zone.code.as_str()).collect();
        assert_eq!(loaded, ["A", "B", "C"]);
        assert_eq!(graph.edges().len(), 3);
        assert!(graph.zone(0).expect("zone A").is_depot(VehicleType::Ambulance));
        assert_eq!(graph.zone(1).expect("zone B").available(VehicleType::Police), 1);
    }

    #[rstest]
    fn claim_decrements_and_appends_once(database: (TempDir, PathBuf)) {
        let (_dir, path) = database;
        let store = SqliteDispatchStore::open(&path).expect("open store");
        let route = codes(&["A", "B"]);

        let outcome = store
            .claim_unit(&claim(VehicleType::Ambulance, "z-a", "A", &route))
            .expect("claim");
        let ClaimOutcome::Claimed(record) = outcome else {
            panic!("expected a claimed unit, got {outcome:?}");
        };
        assert_eq!(record.path, route);

        let graph = store.load_graph().expect("reload");
        assert_eq!(graph.zone(0).expect("zone A").available(VehicleType::Ambulance), 1);
        let log = store.recent_dispatches(10).expect("read log");
        assert_eq!(log.len(), 1);
        assert_eq!(log.first().map(|entry| entry.path.clone()), Some(route));
    }

    #[rstest]
    fn exhausted_counter_is_left_untouched(database: (TempDir, PathBuf)) {
        let (_dir, path) = database;
        let store = SqliteDispatchStore::open(&path).expect("open store");
        let route = codes(&["C"]);

        let outcome = store
            .claim_unit(&claim(VehicleType::FireTruck, "z-c", "C", &route))
            .expect("claim");
        assert_eq!(outcome, ClaimOutcome::Exhausted);
        assert!(store.recent_dispatches(10).expect("read log").is_empty());
    }

    #[rstest]
    fn failed_log_append_rolls_back_the_decrement(database: (TempDir, PathBuf)) {
        let (_dir, path) = database;
        Connection::open(&path)
            .expect("open raw connection")
            .execute_batch(
                "CREATE TRIGGER reject_logs BEFORE INSERT ON dispatch_logs \
                 BEGIN SELECT RAISE(ABORT, 'log unavailable'); END;",
            )
            .expect("install trigger");
        let store = SqliteDispatchStore::open(&path).expect("open store");
        let route = codes(&["B"]);

        let err = store
            .claim_unit(&claim(VehicleType::Police, "z-b", "B", &route))
            .expect_err("log append should fail");
        assert!(matches!(err, StoreError::Backend { operation: "claim unit", .. }));

        let graph = store.load_graph().expect("reload");
        assert_eq!(graph.zone(1).expect("zone B").available(VehicleType::Police), 1);
    }

    #[rstest]
    fn recent_dispatches_are_newest_first_and_limited(database: (TempDir, PathBuf)) {
        let (_dir, path) = database;
        let store = SqliteDispatchStore::open(&path).expect("open store");
        let first = codes(&["A"]);
        let second = codes(&["A", "B"]);
        store
            .claim_unit(&claim(VehicleType::Ambulance, "z-a", "A", &first))
            .expect("first claim");
        store
            .claim_unit(&claim(VehicleType::Ambulance, "z-a", "A", &second))
            .expect("second claim");

        let log = store.recent_dispatches(1).expect("read log");
        assert_eq!(log.len(), 1);
        assert_eq!(log.first().map(|entry| entry.dest_code.as_str()), Some("B"));
        assert_eq!(store.recent_dispatches(10).expect("read log").len(), 2);
    }

    #[rstest]
    fn rejects_databases_without_dispatch_tables() {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("empty.db");
        Connection::open(&path)
            .expect("create database")
            .execute_batch("CREATE TABLE zones (id TEXT PRIMARY KEY);")
            .expect("create table");

        let err = SqliteDispatchStore::open(&path).expect_err("missing tables");
        assert!(matches!(err, SqliteStoreError::MissingTable { table: "edges", .. }));
    }

    #[rstest]
    fn refuses_to_create_missing_files() {
        let dir = TempDir::new().expect("create temp dir");
        let err = SqliteDispatchStore::open(dir.path().join("absent.db"))
            .expect_err("missing file");
        assert!(matches!(err, SqliteStoreError::OpenDatabase { .. }));
    }

    #[rstest]
    fn negative_counts_are_reported_as_corrupt(database: (TempDir, PathBuf)) {
        let (_dir, path) = database;
        Connection::open(&path)
            .expect("open raw connection")
            .execute("UPDATE zones SET police_count = -1 WHERE id = 'z-c'", [])
            .expect("corrupt row");
        let store = SqliteDispatchStore::open(&path).expect("open store");
        let err = store.load_graph().expect_err("corrupt count");
        assert!(matches!(err, StoreError::CorruptRow { table: "zones", .. }));
    }
}
