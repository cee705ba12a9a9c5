//! [`CapabilityGate`] – role-based access decisions.
//!
//! Before any fleet operation runs, call [`CapabilityGate::authorize`] (or
//! [`CapabilityGate::check`]) with the caller's [`Session`] and the
//! [`Capability`] the operation needs.  The gate maps roles to capabilities
//! from a static table; it performs no I/O and never touches the registry.
//!
//! The stock table ([`CapabilityGate::with_default_roles`]):
//!
//! | role       | capabilities                              |
//! |------------|-------------------------------------------|
//! | `viewer`   | `fleet:read`                              |
//! | `operator` | `fleet:read`, `fleet:write`               |
//! | `admin`    | `fleet:read`, `fleet:write`, `fleet:admin` |

use std::collections::{HashMap, HashSet};

use fleet_types::{Capability, FleetError};
use tracing::debug;

use crate::session::Session;

pub const ROLE_VIEWER: &str = "viewer";
pub const ROLE_OPERATOR: &str = "operator";
pub const ROLE_ADMIN: &str = "admin";

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The session carries no user.
    Unauthenticated,
    /// The user holds no role granting the capability.
    InsufficientRole,
}

/// Result of [`CapabilityGate::authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Allowed,
    Denied(DenyReason),
}

impl Authorization {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Authorization::Allowed)
    }
}

/// Static role → capability table.
///
/// # Example
///
/// ```
/// use fleet_kernel::{Authorization, CapabilityGate, DenyReason, ResolvedSession};
/// use fleet_types::Capability;
///
/// let gate = CapabilityGate::with_default_roles();
/// let viewer = ResolvedSession::authenticated("v", ["viewer"]);
///
/// assert!(gate.authorize(&viewer, Capability::FleetRead).is_allowed());
/// assert_eq!(
///     gate.authorize(&viewer, Capability::FleetWrite),
///     Authorization::Denied(DenyReason::InsufficientRole),
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct CapabilityGate {
    grants: HashMap<String, HashSet<Capability>>,
}

impl CapabilityGate {
    /// Create a gate with no roles at all; every authenticated request is
    /// denied until roles are granted.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock viewer / operator / admin table.
    pub fn with_default_roles() -> Self {
        let mut gate = Self::new();
        gate.grant(ROLE_VIEWER, Capability::FleetRead);
        for cap in [Capability::FleetRead, Capability::FleetWrite] {
            gate.grant(ROLE_OPERATOR, cap);
        }
        for cap in [Capability::FleetRead, Capability::FleetWrite, Capability::FleetAdmin] {
            gate.grant(ROLE_ADMIN, cap);
        }
        gate
    }

    /// Build a gate from a role → capability-list table, e.g. one read from
    /// a config file.
    pub fn from_table<'a, I, C>(table: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, C)>,
        C: IntoIterator<Item = &'a Capability>,
    {
        let mut gate = Self::new();
        for (role, caps) in table {
            for cap in caps {
                gate.grant(role, *cap);
            }
        }
        gate
    }

    /// Grant `cap` to `role`.  Duplicate grants are silently ignored.
    pub fn grant(&mut self, role: &str, cap: Capability) {
        self.grants.entry(role.to_string()).or_default().insert(cap);
    }

    /// Revoke `cap` from `role`.  No-ops if the role or capability is not
    /// present.
    pub fn revoke(&mut self, role: &str, cap: Capability) {
        if let Some(set) = self.grants.get_mut(role) {
            set.remove(&cap);
        }
    }

    /// Roles that carry `cap`, sorted.
    pub fn roles_for(&self, cap: Capability) -> Vec<&str> {
        let mut roles: Vec<&str> = self
            .grants
            .iter()
            .filter(|(_, caps)| caps.contains(&cap))
            .map(|(role, _)| role.as_str())
            .collect();
        roles.sort_unstable();
        roles
    }

    /// Decide whether `session` may exercise `cap`.
    pub fn authorize(&self, session: &dyn Session, cap: Capability) -> Authorization {
        if !session.is_authenticated() {
            return Authorization::Denied(DenyReason::Unauthenticated);
        }
        let permitted = self
            .grants
            .iter()
            .any(|(role, caps)| caps.contains(&cap) && session.has_role(role));
        if permitted {
            Authorization::Allowed
        } else {
            Authorization::Denied(DenyReason::InsufficientRole)
        }
    }

    /// Like [`authorize`][Self::authorize], but as a `Result` that can be
    /// propagated with `?`.
    ///
    /// # Errors
    ///
    /// - [`FleetError::Unauthenticated`] – the session has no user.
    /// - [`FleetError::InsufficientRole`] – no role of the user grants `cap`.
    pub fn check(&self, session: &dyn Session, cap: Capability) -> Result<(), FleetError> {
        match self.authorize(session, cap) {
            Authorization::Allowed => Ok(()),
            Authorization::Denied(reason) => {
                debug!(user = ?session.user(), capability = %cap, ?reason, "access denied");
                Err(match reason {
                    DenyReason::Unauthenticated => FleetError::Unauthenticated,
                    DenyReason::InsufficientRole => FleetError::InsufficientRole(cap),
                })
            }
        }
    }
}
