//! [`TransitionPolicy`] – robot status state machine.
//!
//! Every `update_status` call is checked with [`TransitionPolicy::check`]
//! before anything is written.  The policy is a plain value so hosts can swap
//! in their own table; [`TransitionPolicy::default`] is the standard fleet
//! table:
//!
//! | from       | to                               |
//! |------------|----------------------------------|
//! | `IDLE`     | `MISSION`, `CHARGING`, `OFFLINE` |
//! | `MISSION`  | `IDLE`, `ERROR`, `CHARGING`      |
//! | `CHARGING` | `IDLE`                           |
//! | `ERROR`    | `IDLE`                           |
//! | `OFFLINE`  | `IDLE`                           |
//!
//! Two moves are legal under every policy: a self-transition (a no-op write)
//! and any move to `OFFLINE`.

use std::collections::HashSet;

use fleet_types::{FleetError, RobotStatus};
use serde::{Deserialize, Serialize};

/// One permitted `from -> to` edge, in the shape used by config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRule {
    pub from: RobotStatus,
    pub to: RobotStatus,
}

/// Set of permitted status transitions.
///
/// # Example
///
/// ```
/// use fleet_registry::transitions::TransitionPolicy;
/// use fleet_types::RobotStatus;
///
/// let policy = TransitionPolicy::default();
/// assert!(policy.is_allowed(RobotStatus::Mission, RobotStatus::Error));
/// assert!(!policy.is_allowed(RobotStatus::Idle, RobotStatus::Error));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPolicy {
    allowed: HashSet<(RobotStatus, RobotStatus)>,
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        use RobotStatus::*;
        Self::from_pairs([
            (Idle, Mission),
            (Idle, Charging),
            (Mission, Idle),
            (Mission, Error),
            (Mission, Charging),
            (Charging, Idle),
            (Error, Idle),
            (Offline, Idle),
        ])
    }
}

impl TransitionPolicy {
    /// A policy that only permits the always-legal moves.
    pub fn empty() -> Self {
        Self {
            allowed: HashSet::new(),
        }
    }

    /// Build a policy from explicit `(from, to)` edges.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (RobotStatus, RobotStatus)>) -> Self {
        Self {
            allowed: pairs.into_iter().collect(),
        }
    }

    /// Build a policy from config-file rules.
    pub fn from_rules<'a>(rules: impl IntoIterator<Item = &'a TransitionRule>) -> Self {
        Self::from_pairs(rules.into_iter().map(|r| (r.from, r.to)))
    }

    /// Permit `from -> to`.
    pub fn allow(&mut self, from: RobotStatus, to: RobotStatus) {
        self.allowed.insert((from, to));
    }

    /// Withdraw `from -> to`.  Has no effect on the always-legal moves.
    pub fn forbid(&mut self, from: RobotStatus, to: RobotStatus) {
        self.allowed.remove(&(from, to));
    }

    pub fn is_allowed(&self, from: RobotStatus, to: RobotStatus) -> bool {
        from == to || to == RobotStatus::Offline || self.allowed.contains(&(from, to))
    }

    /// Return `Ok(())` when the move is legal, or
    /// [`FleetError::IllegalTransition`] otherwise.
    pub fn check(&self, from: RobotStatus, to: RobotStatus) -> Result<(), FleetError> {
        if self.is_allowed(from, to) {
            Ok(())
        } else {
            Err(FleetError::IllegalTransition { from, to })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_types::RobotStatus::*;

    #[test]
    fn default_table_matches_fleet_lifecycle() {
        let policy = TransitionPolicy::default();
        let legal = [
            (Idle, Mission),
            (Idle, Charging),
            (Idle, Offline),
            (Mission, Idle),
            (Mission, Error),
            (Mission, Charging),
            (Charging, Idle),
            (Error, Idle),
            (Offline, Idle),
        ];
        for (from, to) in legal {
            assert!(policy.is_allowed(from, to), "{from} -> {to} should be legal");
        }
    }

    #[test]
    fn idle_to_error_is_illegal() {
        let err = TransitionPolicy::default().check(Idle, Error).unwrap_err();
        assert_eq!(
            err,
            FleetError::IllegalTransition {
                from: Idle,
                to: Error
            }
        );
    }

    #[test]
    fn no_automatic_recovery_paths() {
        let policy = TransitionPolicy::default();
        assert!(!policy.is_allowed(Error, Mission));
        assert!(!policy.is_allowed(Charging, Mission));
        assert!(!policy.is_allowed(Offline, Mission));
        assert!(!policy.is_allowed(Error, Charging));
    }

    #[test]
    fn every_state_may_go_offline() {
        let policy = TransitionPolicy::empty();
        for from in RobotStatus::ALL {
            assert!(policy.is_allowed(from, Offline));
        }
    }

    #[test]
    fn self_transitions_always_succeed() {
        let policy = TransitionPolicy::empty();
        for status in RobotStatus::ALL {
            assert!(policy.check(status, status).is_ok());
        }
    }

    #[test]
    fn custom_policy_can_add_and_remove_edges() {
        let mut policy = TransitionPolicy::default();
        policy.allow(Charging, Mission);
        policy.forbid(Mission, Charging);
        assert!(policy.is_allowed(Charging, Mission));
        assert!(!policy.is_allowed(Mission, Charging));

        // The offline edge cannot be withdrawn.
        policy.forbid(Idle, Offline);
        assert!(policy.is_allowed(Idle, Offline));
    }

    #[test]
    fn rules_deserialize_from_config_shape() {
        let rules: Vec<TransitionRule> =
            serde_json::from_str(r#"[{"from":"IDLE","to":"ERROR"}]"#).unwrap();
        let policy = TransitionPolicy::from_rules(&rules);
        assert!(policy.is_allowed(Idle, Error));
        assert!(!policy.is_allowed(Idle, Mission));
    }
}
