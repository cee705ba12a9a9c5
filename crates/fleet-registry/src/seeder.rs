//! [`Seeder`] – idempotent bootstrap registration.
//!
//! Runs once at process start-up, before any session exists, so it bypasses
//! the capability gate.  Each entry goes through
//! [`FleetRegistry::upsert_by_name`], which applies the usual validation and
//! uniqueness rules and never touches robots that are already registered.
//! A bad entry is recorded and skipped; the rest of the batch still runs.
//!
//! # Example
//!
//! ```
//! use fleet_registry::{FleetRegistry, Seeder, SqliteRobotStore};
//! use fleet_types::{Pose, RobotInit, RobotStatus};
//!
//! let registry = FleetRegistry::new(Box::new(SqliteRobotStore::open_in_memory().unwrap()));
//! let batch = vec![RobotInit::new("Tensrai1", RobotStatus::Mission, Pose::new(10.0, 10.0, 0.0), 100.0)];
//!
//! let first = Seeder::new(&registry).seed_all(&batch);
//! assert_eq!(first.created(), 1);
//!
//! let second = Seeder::new(&registry).seed_all(&batch);
//! assert_eq!(second.already_existing(), 1);
//! ```

use fleet_types::{FleetError, RobotInit};
use serde::Serialize;
use tracing::{info, warn};

use crate::registry::FleetRegistry;

/// What happened to a single seed entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum SeedOutcome {
    Created,
    AlreadyExists,
    Failed(FleetError),
}

/// Per-entry line of a [`SeedReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedEntryReport {
    pub name: String,
    pub outcome: SeedOutcome,
}

/// Outcome of a seeding run, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeedReport {
    pub entries: Vec<SeedEntryReport>,
}

impl SeedReport {
    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, SeedOutcome::Created))
    }

    pub fn already_existing(&self) -> usize {
        self.count(|o| matches!(o, SeedOutcome::AlreadyExists))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SeedOutcome::Failed(_)))
    }

    /// `true` when no entry failed.
    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&SeedOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }
}

/// Bulk registration routine bound to one registry.
pub struct Seeder<'a> {
    registry: &'a FleetRegistry,
}

impl<'a> Seeder<'a> {
    pub fn new(registry: &'a FleetRegistry) -> Self {
        Self { registry }
    }

    /// Register every entry that is not already present.
    ///
    /// Entries are processed sequentially; the report lists them in the same
    /// order they were given.
    pub fn seed_all(&self, entries: &[RobotInit]) -> SeedReport {
        let mut report = SeedReport::default();
        for init in entries {
            let outcome = match self.registry.upsert_by_name(init.clone()) {
                Ok((_, true)) => SeedOutcome::Created,
                Ok((_, false)) => SeedOutcome::AlreadyExists,
                Err(e) => {
                    warn!(robot = %init.name, error = %e, "seed entry failed");
                    SeedOutcome::Failed(e)
                }
            };
            report.entries.push(SeedEntryReport {
                name: init.name.clone(),
                outcome,
            });
        }
        info!(
            created = report.created(),
            existing = report.already_existing(),
            failed = report.failed(),
            "fleet seeding finished"
        );
        report
    }
}
