use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest legal battery reading (percent).
pub const BATTERY_MIN: f64 = 0.0;
/// Highest legal battery reading (percent).
pub const BATTERY_MAX: f64 = 100.0;

/// Named permission required to perform a fleet operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    /// Read robot state (`find_by_name`, `list`).
    #[serde(rename = "fleet:read")]
    FleetRead,
    /// Register robots and mutate status, pose and battery.
    #[serde(rename = "fleet:write")]
    FleetWrite,
    /// Deregister robots.
    #[serde(rename = "fleet:admin")]
    FleetAdmin,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::FleetRead => "fleet:read",
            Capability::FleetWrite => "fleet:write",
            Capability::FleetAdmin => "fleet:admin",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fleet:read" => Ok(Capability::FleetRead),
            "fleet:write" => Ok(Capability::FleetWrite),
            "fleet:admin" => Ok(Capability::FleetAdmin),
            other => Err(format!("unknown capability '{other}'")),
        }
    }
}

/// Operational status of a robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RobotStatus {
    /// Powered on and waiting for work.
    Idle,
    /// Executing a mission.
    Mission,
    /// Docked and charging.
    Charging,
    /// Faulted; needs an operator to acknowledge before returning to `Idle`.
    Error,
    /// Taken out of service or powered down.
    Offline,
}

impl RobotStatus {
    /// Every status, in declaration order.
    pub const ALL: [RobotStatus; 5] = [
        RobotStatus::Idle,
        RobotStatus::Mission,
        RobotStatus::Charging,
        RobotStatus::Error,
        RobotStatus::Offline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RobotStatus::Idle => "IDLE",
            RobotStatus::Mission => "MISSION",
            RobotStatus::Charging => "CHARGING",
            RobotStatus::Error => "ERROR",
            RobotStatus::Offline => "OFFLINE",
        }
    }
}

impl fmt::Display for RobotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RobotStatus {
    type Err = String;

    /// Case-insensitive parse of the upper-case wire names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        RobotStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == upper)
            .ok_or_else(|| format!("unknown robot status '{s}'"))
    }
}

/// 2D position and heading. `theta` is in radians and is not normalized.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    /// Reject NaN and infinite components.
    pub fn validate(&self) -> Result<(), FleetError> {
        for (field, value) in [("pose.x", self.x), ("pose.y", self.y), ("pose.theta", self.theta)] {
            if !value.is_finite() {
                return Err(FleetError::OutOfRange {
                    field: field.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Check that `value` is a legal battery percentage and return it.
pub fn validate_battery(value: f64) -> Result<f64, FleetError> {
    if (BATTERY_MIN..=BATTERY_MAX).contains(&value) {
        Ok(value)
    } else {
        Err(FleetError::OutOfRange {
            field: "battery".to_string(),
            value,
        })
    }
}

/// Registration payload. Field layout matches the flat seed record
/// `{name, status, x, y, theta, battery}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotInit {
    pub name: String,
    pub status: RobotStatus,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub theta: f64,
    pub battery: f64,
}

impl RobotInit {
    pub fn new(name: impl Into<String>, status: RobotStatus, pose: Pose, battery: f64) -> Self {
        Self {
            name: name.into(),
            status,
            x: pose.x,
            y: pose.y,
            theta: pose.theta,
            battery,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.x, self.y, self.theta)
    }

    /// Apply the same validation every write goes through: non-blank name,
    /// finite pose, battery within range.
    pub fn validate(&self) -> Result<(), FleetError> {
        if self.name.trim().is_empty() {
            return Err(FleetError::InvalidName(self.name.clone()));
        }
        self.pose().validate()?;
        validate_battery(self.battery)?;
        Ok(())
    }
}

/// A battery write, either replacing the reading or adjusting it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "lowercase")]
pub enum BatteryUpdate {
    Absolute(f64),
    Delta(f64),
}

impl BatteryUpdate {
    /// Compute the reading that would result from applying this update to
    /// `current`. Range checks are left to [`validate_battery`].
    pub fn resolve(&self, current: f64) -> f64 {
        match self {
            BatteryUpdate::Absolute(value) => *value,
            BatteryUpdate::Delta(delta) => current + delta,
        }
    }
}

/// A registered fleet unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Robot {
    /// Natural key; immutable after creation.
    pub name: String,
    pub status: RobotStatus,
    pub pose: Pose,
    /// Percentage in `[0, 100]`.
    pub battery: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Error taxonomy shared by the registry, the capability gate and the
/// service facade.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FleetError {
    #[error("Robot not found: {0}")]
    NotFound(String),

    #[error("Robot already registered: {0}")]
    DuplicateKey(String),

    #[error("Illegal status transition {from} -> {to}")]
    IllegalTransition { from: RobotStatus, to: RobotStatus },

    #[error("Value out of range for {field}: {value}")]
    OutOfRange { field: String, value: f64 },

    #[error("Invalid robot name: {0:?}")]
    InvalidName(String),

    #[error("Unauthenticated session")]
    Unauthenticated,

    #[error("Insufficient role for {0}")]
    InsufficientRole(Capability),

    #[error("Storage fault: {0}")]
    StorageFault(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("mission".parse::<RobotStatus>(), Ok(RobotStatus::Mission));
        assert_eq!(" OFFLINE ".parse::<RobotStatus>(), Ok(RobotStatus::Offline));
        assert!("docked".parse::<RobotStatus>().is_err());
    }

    #[test]
    fn status_serializes_upper_case() {
        let json = serde_json::to_string(&RobotStatus::Charging).unwrap();
        assert_eq!(json, "\"CHARGING\"");
    }

    #[test]
    fn capability_uses_colon_names() {
        let json = serde_json::to_string(&Capability::FleetAdmin).unwrap();
        assert_eq!(json, "\"fleet:admin\"");
        assert_eq!("fleet:write".parse::<Capability>(), Ok(Capability::FleetWrite));
        assert!("fleet:delete".parse::<Capability>().is_err());
    }

    #[test]
    fn battery_bounds_are_inclusive() {
        assert!(validate_battery(0.0).is_ok());
        assert!(validate_battery(100.0).is_ok());
        assert!(matches!(
            validate_battery(150.0),
            Err(FleetError::OutOfRange { .. })
        ));
        assert!(validate_battery(-5.0).is_err());
        assert!(validate_battery(f64::NAN).is_err());
    }

    #[test]
    fn battery_update_resolves_against_current() {
        assert_eq!(BatteryUpdate::Absolute(42.0).resolve(90.0), 42.0);
        assert_eq!(BatteryUpdate::Delta(-1.0).resolve(50.0), 49.0);
    }

    #[test]
    fn pose_rejects_non_finite_components() {
        assert!(Pose::new(1.0, 2.0, -7.5).validate().is_ok());
        let err = Pose::new(f64::INFINITY, 0.0, 0.0).validate().unwrap_err();
        assert!(matches!(err, FleetError::OutOfRange { ref field, .. } if field == "pose.x"));
    }

    #[test]
    fn robot_init_rejects_blank_name() {
        let init = RobotInit::new("  ", RobotStatus::Idle, Pose::default(), 50.0);
        assert!(matches!(init.validate(), Err(FleetError::InvalidName(_))));
    }

    #[test]
    fn seed_record_deserializes_flat() {
        let init: RobotInit = serde_json::from_str(
            r#"{"name":"Tensrai1","status":"MISSION","x":10,"y":10,"theta":0,"battery":100}"#,
        )
        .unwrap();
        assert_eq!(init.status, RobotStatus::Mission);
        assert_eq!(init.pose(), Pose::new(10.0, 10.0, 0.0));
    }

    #[test]
    fn fleet_error_display() {
        let err = FleetError::IllegalTransition {
            from: RobotStatus::Idle,
            to: RobotStatus::Error,
        };
        assert_eq!(err.to_string(), "Illegal status transition IDLE -> ERROR");

        let err = FleetError::InsufficientRole(Capability::FleetWrite);
        assert!(err.to_string().contains("fleet:write"));
    }
}
