//! [`FleetService`] – the capability-gated fleet facade.
//!
//! Every registry operation reachable from outside the process goes through
//! this type.  Each call first asks the [`CapabilityGate`] whether the
//! caller's [`Session`] holds the required [`Capability`]; on denial the
//! registry is never touched.  On success the registry's result, or its
//! error, is returned unchanged.
//!
//! | Operation | Required [`Capability`] |
//! |-----------|------------------------|
//! | `find_by_name`, `list` | `fleet:read` |
//! | `create`, `register`, `update_status`, `update_pose`, `update_battery` | `fleet:write` |
//! | `remove` | `fleet:admin` |
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use fleet_kernel::{CapabilityGate, FleetService, ResolvedSession};
//! use fleet_registry::{FleetRegistry, SqliteRobotStore};
//! use fleet_types::{FleetError, Pose, RobotInit, RobotStatus};
//!
//! let registry = Arc::new(FleetRegistry::new(Box::new(
//!     SqliteRobotStore::open_in_memory().unwrap(),
//! )));
//! let service = FleetService::new(registry, CapabilityGate::with_default_roles());
//!
//! let operator = ResolvedSession::authenticated("ops", ["operator"]);
//! service
//!     .create(&operator, RobotInit::new("Tensrai1", RobotStatus::Idle, Pose::default(), 80.0))
//!     .unwrap();
//!
//! // Operators may not deregister robots.
//! assert_eq!(
//!     service.remove(&operator, "Tensrai1"),
//!     Err(FleetError::InsufficientRole(fleet_types::Capability::FleetAdmin)),
//! );
//! ```

use std::sync::Arc;

use fleet_registry::FleetRegistry;
use fleet_types::{BatteryUpdate, Capability, FleetError, Pose, Robot, RobotInit, RobotStatus};
use tracing::instrument;

use crate::capability_gate::CapabilityGate;
use crate::session::Session;

/// Externally callable fleet surface.
///
/// The wrapped registry is never handed out; callers that need ungated
/// access (the bootstrap seeder) keep their own [`Arc`] to it.
///
/// ```compile_fail
/// use std::sync::Arc;
///
/// use fleet_kernel::{CapabilityGate, FleetService};
/// use fleet_registry::{FleetRegistry, SqliteRobotStore};
///
/// let registry = Arc::new(FleetRegistry::new(Box::new(
///     SqliteRobotStore::open_in_memory().unwrap(),
/// )));
/// let service = FleetService::new(registry, CapabilityGate::with_default_roles());
/// let _ = service.registry();
/// ```
pub struct FleetService {
    registry: Arc<FleetRegistry>,
    gate: CapabilityGate,
}

impl FleetService {
    /// Construct a service over a shared registry and an already-configured
    /// [`CapabilityGate`].
    pub fn new(registry: Arc<FleetRegistry>, gate: CapabilityGate) -> Self {
        Self { registry, gate }
    }

    pub fn gate(&self) -> &CapabilityGate {
        &self.gate
    }

    pub fn find_by_name(&self, session: &dyn Session, name: &str) -> Result<Option<Robot>, FleetError> {
        self.gate.check(session, Capability::FleetRead)?;
        self.registry.find_by_name(name)
    }

    pub fn list(&self, session: &dyn Session) -> Result<Vec<Robot>, FleetError> {
        self.gate.check(session, Capability::FleetRead)?;
        self.registry.list()
    }

    /// Register a new robot; fails with [`FleetError::DuplicateKey`] when the
    /// name is taken.
    #[instrument(level = "debug", skip_all, fields(robot = %init.name))]
    pub fn create(&self, session: &dyn Session, init: RobotInit) -> Result<Robot, FleetError> {
        self.gate.check(session, Capability::FleetWrite)?;
        self.registry.create(init)
    }

    /// Idempotent runtime registration: creates the robot if absent and
    /// otherwise returns the existing record untouched.
    #[instrument(level = "debug", skip_all, fields(robot = %init.name))]
    pub fn register(&self, session: &dyn Session, init: RobotInit) -> Result<(Robot, bool), FleetError> {
        self.gate.check(session, Capability::FleetWrite)?;
        self.registry.upsert_by_name(init)
    }

    #[instrument(level = "debug", skip(self, session))]
    pub fn update_status(
        &self,
        session: &dyn Session,
        name: &str,
        status: RobotStatus,
    ) -> Result<Robot, FleetError> {
        self.gate.check(session, Capability::FleetWrite)?;
        self.registry.update_status(name, status)
    }

    #[instrument(level = "debug", skip(self, session))]
    pub fn update_pose(&self, session: &dyn Session, name: &str, pose: Pose) -> Result<Robot, FleetError> {
        self.gate.check(session, Capability::FleetWrite)?;
        self.registry.update_pose(name, pose)
    }

    #[instrument(level = "debug", skip(self, session))]
    pub fn update_battery(
        &self,
        session: &dyn Session,
        name: &str,
        update: BatteryUpdate,
    ) -> Result<Robot, FleetError> {
        self.gate.check(session, Capability::FleetWrite)?;
        self.registry.update_battery(name, update)
    }

    /// Deregister a robot.  Requires `fleet:admin`.
    #[instrument(level = "debug", skip(self, session))]
    pub fn remove(&self, session: &dyn Session, name: &str) -> Result<(), FleetError> {
        self.gate.check(session, Capability::FleetAdmin)?;
        self.registry.remove(name)
    }
}
