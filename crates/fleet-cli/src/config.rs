//! Configuration Vault – reads/writes `~/.fleet/config.toml`.
//!
//! ```toml
//! database_path = "/home/ops/.fleet/fleet.db"
//!
//! [roles]
//! viewer = ["fleet:read"]
//! operator = ["fleet:read", "fleet:write"]
//! admin = ["fleet:read", "fleet:write", "fleet:admin"]
//!
//! [[transitions]]        # optional; omit for the standard table
//! from = "IDLE"
//! to = "MISSION"
//!
//! [[seed]]
//! name = "Tensrai1"
//! status = "MISSION"
//! x = 10.0
//! y = 10.0
//! theta = 0.0
//! battery = 100.0
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use fleet_kernel::{CapabilityGate, ROLE_ADMIN, ROLE_OPERATOR, ROLE_VIEWER};
use fleet_registry::{TransitionPolicy, TransitionRule};
use fleet_types::{Capability, Pose, RobotInit, RobotStatus};
use serde::{Deserialize, Serialize};

/// Persisted host configuration stored in `~/.fleet/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite file backing the registry.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Role name → capabilities it grants.
    #[serde(default = "default_roles")]
    pub roles: BTreeMap<String, Vec<Capability>>,

    /// Permitted status moves.  `None` selects the standard table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitions: Option<Vec<TransitionRule>>,

    /// Robots registered at start-up if not already present.
    #[serde(default = "default_seed")]
    pub seed: Vec<RobotInit>,
}

fn default_database_path() -> String {
    fleet_dir_for_home(&home_dir())
        .join("fleet.db")
        .to_string_lossy()
        .into_owned()
}

fn default_roles() -> BTreeMap<String, Vec<Capability>> {
    BTreeMap::from([
        (ROLE_VIEWER.to_string(), vec![Capability::FleetRead]),
        (
            ROLE_OPERATOR.to_string(),
            vec![Capability::FleetRead, Capability::FleetWrite],
        ),
        (
            ROLE_ADMIN.to_string(),
            vec![Capability::FleetRead, Capability::FleetWrite, Capability::FleetAdmin],
        ),
    ])
}

fn default_seed() -> Vec<RobotInit> {
    vec![RobotInit::new(
        "Tensrai1",
        RobotStatus::Mission,
        Pose::new(10.0, 10.0, 0.0),
        100.0,
    )]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            roles: default_roles(),
            transitions: None,
            seed: default_seed(),
        }
    }
}

impl Config {
    /// Capability gate built from the `[roles]` table.
    pub fn capability_gate(&self) -> CapabilityGate {
        CapabilityGate::from_table(&self.roles)
    }

    /// Transition policy built from `[[transitions]]`, or the standard table.
    pub fn transition_policy(&self) -> TransitionPolicy {
        match &self.transitions {
            Some(rules) => TransitionPolicy::from_rules(rules),
            None => TransitionPolicy::default(),
        }
    }
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

fn fleet_dir_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".fleet")
}

/// Return the path to `~/.fleet/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    fleet_dir_for_home(home).join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `FLEET_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `FLEET_DATABASE_PATH` | `database_path` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("FLEET_DATABASE_PATH")
        && !v.trim().is_empty()
    {
        cfg.database_path = v;
    }
}

/// Save the config to disk, creating `~/.fleet/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner-only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_kernel::ResolvedSession;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config::default();
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.roles, default_roles());
        assert_eq!(loaded.seed, default_seed());
        assert!(loaded.transitions.is_none());
    }

    #[test]
    fn config_path_points_to_fleet_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".fleet"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[[seed]]\nname = \"solo\"\nstatus = \"IDLE\"\nbattery = 50.0\n").unwrap();

        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.roles, default_roles());
        assert_eq!(cfg.seed.len(), 1);
        assert_eq!(cfg.seed[0].pose(), Pose::default());
    }

    #[test]
    fn parses_roles_transitions_and_seed() {
        let raw = r#"
            database_path = "fleet.db"

            [roles]
            dispatcher = ["fleet:read", "fleet:write"]

            [[transitions]]
            from = "IDLE"
            to = "ERROR"

            [[seed]]
            name = "Tensrai2"
            status = "IDLE"
            x = 1.5
            y = -2.0
            theta = 1.25
            battery = 64.0
        "#;
        let cfg: Config = toml::from_str(raw).unwrap();

        let gate = cfg.capability_gate();
        let dispatcher = ResolvedSession::authenticated("d", ["dispatcher"]);
        assert!(gate.check(&dispatcher, Capability::FleetWrite).is_ok());
        assert!(gate.check(&dispatcher, Capability::FleetAdmin).is_err());

        let policy = cfg.transition_policy();
        assert!(policy.is_allowed(RobotStatus::Idle, RobotStatus::Error));
        assert!(!policy.is_allowed(RobotStatus::Idle, RobotStatus::Mission));

        assert_eq!(cfg.seed[0].name, "Tensrai2");
        assert_eq!(cfg.seed[0].pose(), Pose::new(1.5, -2.0, 1.25));
    }

    #[test]
    fn unknown_capability_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[roles]\nviewer = [\"fleet:delete\"]\n").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(err.contains("Failed to parse config"));
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        save_to(&Config::default(), &path).expect("save");

        let file_mode = fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = fs::metadata(path.parent().unwrap()).expect("dir metadata").permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn database_path_override() {
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, |key| {
            (key == "FLEET_DATABASE_PATH").then(|| "/srv/fleet/registry.db".to_string())
        });
        assert_eq!(cfg.database_path, "/srv/fleet/registry.db");
    }

    #[test]
    fn blank_or_missing_override_keeps_database_path() {
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, |_| Some("   ".to_string()));
        assert_eq!(cfg.database_path, default_database_path());
        apply_overrides(&mut cfg, |_| None);
        assert_eq!(cfg.database_path, default_database_path());
    }
}
