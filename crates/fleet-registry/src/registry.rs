//! [`FleetRegistry`] – the owner of every robot record.
//!
//! The registry wraps a [`RobotStore`] and enforces the fleet invariants on
//! top of it:
//!
//! - one robot per `name` (compare-and-insert on the natural key),
//! - battery within `[0, 100]` and finite pose components,
//! - status moves permitted by the configured [`TransitionPolicy`],
//! - `updated_at` strictly increasing on every successful write.
//!
//! All validation happens before the store is written, so a rejected call
//! leaves the record untouched.
//!
//! # Concurrency
//!
//! Writes to the same `name` are serialized by a per-name lock held across
//! the read-validate-write sequence, so concurrent battery deltas never lose
//! updates.  Writes to different names take different locks; they share only
//! the store's own statement-level serialization (see [`crate::store`]).  Reads skip the
//! per-name locks and see either the old or the new row, since every write is
//! a single-row statement.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use fleet_types::{BatteryUpdate, FleetError, Pose, Robot, RobotInit, RobotStatus, validate_battery};
use tracing::{debug, info, warn};

use crate::store::RobotStore;
use crate::transitions::TransitionPolicy;

/// Durable collection of robots plus its mutation/query operations.
///
/// Construct one at process start-up and share it by reference (typically an
/// [`Arc`]) with the service layer and the seeder.
///
/// # Example
///
/// ```
/// use fleet_registry::{FleetRegistry, SqliteRobotStore};
/// use fleet_types::{BatteryUpdate, Pose, RobotInit, RobotStatus};
///
/// let registry = FleetRegistry::new(Box::new(SqliteRobotStore::open_in_memory().unwrap()));
/// registry
///     .create(RobotInit::new("Tensrai1", RobotStatus::Idle, Pose::default(), 50.0))
///     .unwrap();
///
/// let robot = registry.update_battery("Tensrai1", BatteryUpdate::Delta(-10.0)).unwrap();
/// assert_eq!(robot.battery, 40.0);
///
/// // Out of range writes are rejected, never clamped.
/// assert!(registry.update_battery("Tensrai1", BatteryUpdate::Absolute(150.0)).is_err());
/// ```
pub struct FleetRegistry {
    store: Box<dyn RobotStore>,
    policy: TransitionPolicy,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FleetRegistry {
    /// Create a registry over `store` using the default transition table.
    pub fn new(store: Box<dyn RobotStore>) -> Self {
        Self::with_policy(store, TransitionPolicy::default())
    }

    /// Create a registry over `store` with a custom transition table.
    pub fn with_policy(store: Box<dyn RobotStore>, policy: TransitionPolicy) -> Self {
        Self {
            store,
            policy,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &TransitionPolicy {
        &self.policy
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Look up a robot by name.
    pub fn find_by_name(&self, name: &str) -> Result<Option<Robot>, FleetError> {
        Ok(self.store.get(name)?)
    }

    pub fn exists(&self, name: &str) -> Result<bool, FleetError> {
        Ok(self.store.get(name)?.is_some())
    }

    /// All robots in creation order.
    pub fn list(&self) -> Result<Vec<Robot>, FleetError> {
        Ok(self.store.list()?)
    }

    /// Number of registered robots.
    pub fn len(&self) -> Result<usize, FleetError> {
        Ok(self.store.count()?)
    }

    pub fn is_empty(&self) -> Result<bool, FleetError> {
        Ok(self.len()? == 0)
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a new robot.
    ///
    /// Returns [`FleetError::DuplicateKey`] when the name is taken.
    pub fn create(&self, init: RobotInit) -> Result<Robot, FleetError> {
        init.validate()?;
        let lease = self.key_lock(&init.name);
        let _guard = lease.lock();

        if self.store.get(&init.name)?.is_some() {
            return Err(FleetError::DuplicateKey(init.name));
        }
        self.insert_new(init)
    }

    /// Register a robot unless one with the same name already exists.
    ///
    /// An existing robot is returned unchanged together with `false`; live
    /// status, pose and battery are never overwritten.  The payload is
    /// validated either way.
    pub fn upsert_by_name(&self, init: RobotInit) -> Result<(Robot, bool), FleetError> {
        init.validate()?;
        let lease = self.key_lock(&init.name);
        let _guard = lease.lock();

        if let Some(existing) = self.store.get(&init.name)? {
            debug!(robot = %existing.name, "registration skipped, robot already present");
            return Ok((existing, false));
        }
        Ok((self.insert_new(init)?, true))
    }

    /// Deregister a robot.
    pub fn remove(&self, name: &str) -> Result<(), FleetError> {
        let lease = self.key_lock(name);
        let _guard = lease.lock();

        if !self.store.delete(name)? {
            return Err(FleetError::NotFound(name.to_string()));
        }
        info!(robot = %name, "robot deregistered");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Move a robot to `status`.
    ///
    /// Returns [`FleetError::IllegalTransition`] when the policy forbids the
    /// move.  Setting the current status again succeeds and still advances
    /// `updated_at`.
    pub fn update_status(&self, name: &str, status: RobotStatus) -> Result<Robot, FleetError> {
        self.mutate(name, |robot| {
            if let Err(e) = self.policy.check(robot.status, status) {
                warn!(robot = %robot.name, from = %robot.status, to = %status, "status transition rejected");
                return Err(e);
            }
            robot.status = status;
            Ok(())
        })
    }

    /// Replace a robot's pose.  Allowed in every status.
    pub fn update_pose(&self, name: &str, pose: Pose) -> Result<Robot, FleetError> {
        pose.validate()?;
        self.mutate(name, |robot| {
            robot.pose = pose;
            Ok(())
        })
    }

    /// Set or adjust a robot's battery reading.
    ///
    /// Returns [`FleetError::OutOfRange`] when the resulting value would leave
    /// `[0, 100]`; the stored value is left as it was.
    pub fn update_battery(&self, name: &str, update: BatteryUpdate) -> Result<Robot, FleetError> {
        self.mutate(name, |robot| {
            robot.battery = validate_battery(update.resolve(robot.battery))?;
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Lease the lock guarding writes to `name`, creating it if needed.
    fn key_lock(&self, name: &str) -> KeyLease<'_> {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = locks.entry(name.to_string()).or_default().clone();
        KeyLease {
            locks: &self.key_locks,
            name: name.to_string(),
            lock,
        }
    }

    /// Caller must hold the key lock for `init.name`.
    fn insert_new(&self, init: RobotInit) -> Result<Robot, FleetError> {
        let now = Utc::now();
        let robot = Robot {
            pose: init.pose(),
            name: init.name,
            status: init.status,
            battery: init.battery,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&robot)?;
        info!(robot = %robot.name, status = %robot.status, "robot registered");
        Ok(robot)
    }

    /// Read-modify-write `name` under its key lock.
    fn mutate<F>(&self, name: &str, apply: F) -> Result<Robot, FleetError>
    where
        F: FnOnce(&mut Robot) -> Result<(), FleetError>,
    {
        let lease = self.key_lock(name);
        let _guard = lease.lock();

        let mut robot = self
            .store
            .get(name)?
            .ok_or_else(|| FleetError::NotFound(name.to_string()))?;
        apply(&mut robot)?;
        robot.updated_at = next_timestamp(robot.updated_at);

        if !self.store.update(&robot)? {
            return Err(FleetError::NotFound(name.to_string()));
        }
        debug!(robot = %robot.name, status = %robot.status, battery = robot.battery, "robot updated");
        Ok(robot)
    }
}

/// Shared handle on one per-name lock.
///
/// The map entry lives only while some lease for the name exists; the last
/// lease to drop removes it, so unknown names leave nothing behind.  Entry
/// creation and removal both happen under the map lock, so every caller for
/// a name sees the same [`Mutex`].
struct KeyLease<'a> {
    locks: &'a Mutex<HashMap<String, Arc<Mutex<()>>>>,
    name: String,
    lock: Arc<Mutex<()>>,
}

impl KeyLease<'_> {
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for KeyLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here: nobody else is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.name);
        }
    }
}

/// Current time, or one microsecond past `previous` if the clock has not
/// moved beyond it.
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
