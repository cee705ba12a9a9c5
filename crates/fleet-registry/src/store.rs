//! Durable keyed robot store.
//!
//! [`RobotStore`] is the only thing the registry needs from persistence: a
//! map from `name` to the full [`Robot`] record with atomic single-row
//! writes.  [`SqliteRobotStore`] is the bundled implementation.
//!
//! # Storage layout
//!
//! A single SQLite table `robots` is created (if it does not already exist)
//! with the following columns:
//!
//! | column     | type | description                                  |
//! |------------|------|----------------------------------------------|
//! | name       | TEXT | Natural primary key                          |
//! | status     | TEXT | `IDLE`, `MISSION`, `CHARGING`, `ERROR`, `OFFLINE` |
//! | x          | REAL | Pose x                                       |
//! | y          | REAL | Pose y                                       |
//! | theta      | REAL | Pose heading in radians                      |
//! | battery    | REAL | Battery percentage                           |
//! | created_at | TEXT | RFC-3339 creation timestamp (UTC)            |
//! | updated_at | TEXT | RFC-3339 last-update timestamp (UTC)         |
//!
//! Listing order is the implicit `rowid`, i.e. insertion order.
//!
//! # Concurrency
//!
//! [`SqliteRobotStore`] owns one connection behind a [`Mutex`], so single
//! statements from every caller run one at a time, whatever robot they
//! touch.  Each statement is a primary-key lookup or a one-row write and the
//! mutex is held only for that statement, never across the registry's
//! read-validate-write sequence.  The per-name locks in the registry are what
//! keep writers on different robots from waiting on each other's validation.
//! This is the SQLite trade-off: an in-memory database cannot be shared
//! across connections, and a file-backed one still admits a single writer.
//! A pooled store can be dropped in behind [`RobotStore`] without touching
//! the registry.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use fleet_registry::store::{RobotStore, SqliteRobotStore};
//! use fleet_types::{Pose, Robot, RobotStatus};
//!
//! let store = SqliteRobotStore::open_in_memory().unwrap();
//! let now = Utc::now();
//! store.insert(&Robot {
//!     name: "Tensrai1".into(),
//!     status: RobotStatus::Mission,
//!     pose: Pose::new(10.0, 10.0, 0.0),
//!     battery: 100.0,
//!     created_at: now,
//!     updated_at: now,
//! }).unwrap();
//!
//! assert!(store.get("Tensrai1").unwrap().is_some());
//! ```

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use fleet_types::{FleetError, Pose, Robot, RobotStatus};
use rusqlite::{Connection, ErrorCode, params};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from the durable store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Key already present: {0}")]
    Duplicate(String),
    #[error("Corrupt record for {name}: {details}")]
    Corrupt { name: String, details: String },
    #[error("Store connection lock poisoned")]
    Poisoned,
}

impl From<StoreError> for FleetError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(name) => FleetError::DuplicateKey(name),
            other => FleetError::StorageFault(other.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RobotStore
// ─────────────────────────────────────────────────────────────────────────────

/// A durable map from robot name to robot record.
///
/// Every method must be atomic with respect to the single row it touches.
/// Implementations perform no retries; faults are returned to the caller.
pub trait RobotStore: Send + Sync {
    /// Fetch a record by name.
    fn get(&self, name: &str) -> Result<Option<Robot>, StoreError>;

    /// Insert a new record.  Returns [`StoreError::Duplicate`] when the name
    /// is already present.
    fn insert(&self, robot: &Robot) -> Result<(), StoreError>;

    /// Overwrite the mutable fields of an existing record.  Returns `false`
    /// when no record with that name exists.
    fn update(&self, robot: &Robot) -> Result<bool, StoreError>;

    /// Delete a record.  Returns `false` when no record with that name exists.
    fn delete(&self, name: &str) -> Result<bool, StoreError>;

    /// All records in insertion order.
    fn list(&self) -> Result<Vec<Robot>, StoreError>;

    /// Number of stored records.
    fn count(&self) -> Result<usize, StoreError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// SqliteRobotStore
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed [`RobotStore`].
///
/// The connection sits behind a mutex so the store can be shared across
/// request threads; see the module docs for what that serializes.
pub struct SqliteRobotStore {
    conn: Mutex<Connection>,
}

impl SqliteRobotStore {
    /// Open (or create) a persistent SQLite store at `path`.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open a temporary in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS robots (
                name       TEXT NOT NULL PRIMARY KEY,
                status     TEXT NOT NULL,
                x          REAL NOT NULL,
                y          REAL NOT NULL,
                theta      REAL NOT NULL,
                battery    REAL NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }
}

impl RobotStore for SqliteRobotStore {
    fn get(&self, name: &str) -> Result<Option<Robot>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, status, x, y, theta, battery, created_at, updated_at
             FROM robots WHERE name = ?1",
        )?;
        let mut rows = stmt.query_map(params![name], row_to_raw)?;
        match rows.next() {
            Some(raw) => Ok(Some(raw?.into_robot()?)),
            None => Ok(None),
        }
    }

    fn insert(&self, robot: &Robot) -> Result<(), StoreError> {
        let result = self.conn()?.execute(
            "INSERT INTO robots (name, status, x, y, theta, battery, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                robot.name,
                robot.status.as_str(),
                robot.pose.x,
                robot.pose.y,
                robot.pose.theta,
                robot.battery,
                format_timestamp(robot.created_at),
                format_timestamp(robot.updated_at),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::Duplicate(robot.name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update(&self, robot: &Robot) -> Result<bool, StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE robots
             SET status = ?1, x = ?2, y = ?3, theta = ?4, battery = ?5, updated_at = ?6
             WHERE name = ?7",
            params![
                robot.status.as_str(),
                robot.pose.x,
                robot.pose.y,
                robot.pose.theta,
                robot.battery,
                format_timestamp(robot.updated_at),
                robot.name,
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let changed = self
            .conn()?
            .execute("DELETE FROM robots WHERE name = ?1", params![name])?;
        Ok(changed > 0)
    }

    fn list(&self) -> Result<Vec<Robot>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, status, x, y, theta, battery, created_at, updated_at
             FROM robots ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map([], row_to_raw)?;
        let mut robots = Vec::new();
        for raw in rows {
            robots.push(raw?.into_robot()?);
        }
        Ok(robots)
    }

    fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM robots", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or_default())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

/// Column values as read, before enum and timestamp decoding.
struct RawRow {
    name: String,
    status: String,
    x: f64,
    y: f64,
    theta: f64,
    battery: f64,
    created_at: String,
    updated_at: String,
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        name: row.get(0)?,
        status: row.get(1)?,
        x: row.get(2)?,
        y: row.get(3)?,
        theta: row.get(4)?,
        battery: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl RawRow {
    fn into_robot(self) -> Result<Robot, StoreError> {
        let status: RobotStatus = self.status.parse().map_err(|details| StoreError::Corrupt {
            name: self.name.clone(),
            details,
        })?;
        let created_at = parse_timestamp(&self.name, &self.created_at)?;
        let updated_at = parse_timestamp(&self.name, &self.updated_at)?;
        Ok(Robot {
            name: self.name,
            status,
            pose: Pose::new(self.x, self.y, self.theta),
            battery: self.battery,
            created_at,
            updated_at,
        })
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(name: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            name: name.to_string(),
            details: format!("bad timestamp '{raw}': {e}"),
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
