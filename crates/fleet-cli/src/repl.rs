//! REPL – the `fleetctl` interactive shell.
//!
//! The shell is the host's session resolver: `/login` and `/logout` build a
//! [`ResolvedSession`] which is then passed explicitly into every
//! [`FleetService`] call.
//!
//! Supported slash-commands:
//!   /help                                   – show this list
//!   /login <user> <role>...                 – resolve a session
//!   /logout                                 – back to anonymous
//!   /whoami                                 – show the current session
//!   /list                                   – list the fleet
//!   /show <name>                            – show one robot as JSON
//!   /register <name> <status> <x> <y> <theta> <battery>
//!   /status <name> <STATUS>                 – change status
//!   /pose <name> <x> <y> <theta>            – set pose
//!   /battery <name> <value|+delta|-delta>   – set or adjust battery
//!   /remove <name>                          – deregister (admin)
//!   /quit | /exit                           – leave the shell

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fleet_kernel::{FleetService, ResolvedSession, Session};
use fleet_types::{BatteryUpdate, FleetError, Pose, Robot, RobotInit, RobotStatus};

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Login { user: String, roles: Vec<String> },
    Logout,
    WhoAmI,
    List,
    Show(String),
    Register(RobotInit),
    Status(String, RobotStatus),
    Pose(String, Pose),
    Battery(String, BatteryUpdate),
    Remove(String),
    Quit,
}

/// Entry point for the interactive shell.
///
/// `shutdown` is polled each iteration; when set the shell exits cleanly.
pub fn run(service: &FleetService, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut session = ResolvedSession::anonymous();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let who = session.user().unwrap_or("anonymous").to_string();
        print!("{}{} ", who.dimmed(), "@fleet>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let cmd = line.trim();
        if cmd.is_empty() {
            continue;
        }

        match parse_command(cmd) {
            Ok(Command::Quit) => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Ok(command) => execute(service, &mut session, command),
            Err(msg) => println!("{} {}", "✗".red().bold(), msg),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let head = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    let command = match (head, args.as_slice()) {
        ("/help", []) => Command::Help,
        ("/login", [user, roles @ ..]) => Command::Login {
            user: user.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        },
        ("/logout", []) => Command::Logout,
        ("/whoami", []) => Command::WhoAmI,
        ("/list", []) => Command::List,
        ("/show", [name]) => Command::Show(name.to_string()),
        ("/register", [name, status, x, y, theta, battery]) => Command::Register(RobotInit::new(
            *name,
            status.parse()?,
            Pose::new(number("x", x)?, number("y", y)?, number("theta", theta)?),
            number("battery", battery)?,
        )),
        ("/status", [name, status]) => Command::Status(name.to_string(), status.parse()?),
        ("/pose", [name, x, y, theta]) => Command::Pose(
            name.to_string(),
            Pose::new(number("x", x)?, number("y", y)?, number("theta", theta)?),
        ),
        ("/battery", [name, value]) => Command::Battery(name.to_string(), battery_update(value)?),
        ("/remove", [name]) => Command::Remove(name.to_string()),
        ("/quit" | "/exit", []) => Command::Quit,
        (
            "/help" | "/login" | "/logout" | "/whoami" | "/list" | "/show" | "/register" | "/status"
            | "/pose" | "/battery" | "/remove" | "/quit" | "/exit",
            _,
        ) => {
            return Err(format!(
                "Wrong arguments for {}. Type {} for usage.",
                head.yellow(),
                "/help".bold()
            ));
        }
        (other, _) => {
            return Err(format!(
                "Unknown command: '{}'. Type {} for available commands.",
                other.yellow(),
                "/help".bold()
            ));
        }
    };
    Ok(command)
}

fn number(field: &str, raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .map_err(|_| format!("{field} must be a number, got '{raw}'"))
}

/// `+5` / `-5` adjust, a bare number replaces.
fn battery_update(raw: &str) -> Result<BatteryUpdate, String> {
    let value = number("battery", raw)?;
    if raw.starts_with('+') || raw.starts_with('-') {
        Ok(BatteryUpdate::Delta(value))
    } else {
        Ok(BatteryUpdate::Absolute(value))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Run one command against `service` as `session`.
pub fn execute(service: &FleetService, session: &mut ResolvedSession, command: Command) {
    match command {
        Command::Help => cmd_help(),
        Command::Login { user, roles } => {
            *session = ResolvedSession::authenticated(user, roles);
            cmd_whoami(session);
        }
        Command::Logout => {
            *session = ResolvedSession::anonymous();
            println!("  Logged out.");
        }
        Command::WhoAmI => cmd_whoami(session),
        Command::List => match service.list(&*session) {
            Ok(robots) if robots.is_empty() => println!("  {}", "No robots registered.".dimmed()),
            Ok(robots) => print_fleet(&robots),
            Err(e) => report(&e),
        },
        Command::Show(name) => match service.find_by_name(&*session, &name) {
            Ok(Some(robot)) => match serde_json::to_string_pretty(&robot) {
                Ok(json) => println!("{json}"),
                Err(e) => println!("{}: {}", "Serialization error".red(), e),
            },
            Ok(None) => println!("  {} '{}'", "No robot named".yellow(), name),
            Err(e) => report(&e),
        },
        Command::Register(init) => match service.register(&*session, init) {
            Ok((robot, true)) => print_done("registered", &robot),
            Ok((robot, false)) => print_done("already registered", &robot),
            Err(e) => report(&e),
        },
        Command::Status(name, status) => {
            show_result("status updated", service.update_status(&*session, &name, status))
        }
        Command::Pose(name, pose) => show_result("pose updated", service.update_pose(&*session, &name, pose)),
        Command::Battery(name, update) => {
            show_result("battery updated", service.update_battery(&*session, &name, update))
        }
        Command::Remove(name) => match service.remove(&*session, &name) {
            Ok(()) => println!("{} {}", "✓ Deregistered".green(), name.bold()),
            Err(e) => report(&e),
        },
        Command::Quit => {}
    }
}

fn cmd_help() {
    println!();
    println!("{}", "Fleet Commands".bold().underline());
    println!("  {}  – resolve a session", "/login <user> <role>...".bold().cyan());
    println!("  {}                  – back to anonymous", "/logout".bold().cyan());
    println!("  {}                  – show the current session", "/whoami".bold().cyan());
    println!("  {}                    – list the fleet (fleet:read)", "/list".bold().cyan());
    println!("  {}             – show one robot (fleet:read)", "/show <name>".bold().cyan());
    println!(
        "  {}\n                           – register a robot (fleet:write)",
        "/register <name> <status> <x> <y> <theta> <battery>".bold().cyan()
    );
    println!("  {}  – change status (fleet:write)", "/status <name> <STATUS>".bold().cyan());
    println!("  {}  – set pose (fleet:write)", "/pose <name> <x> <y> <theta>".bold().cyan());
    println!("  {}  – set or adjust battery (fleet:write)", "/battery <name> <v|+d|-d>".bold().cyan());
    println!("  {}           – deregister (fleet:admin)", "/remove <name>".bold().cyan());
    println!("  {}            – exit the shell", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_whoami(session: &ResolvedSession) {
    match session.user() {
        Some(user) => {
            let roles: Vec<&str> = session.roles().collect();
            println!("  {} as {} [{}]", "Session".green(), user.bold(), roles.join(", "));
        }
        None => println!("  {}", "Anonymous session".yellow()),
    }
}

fn show_result(what: &str, result: Result<Robot, FleetError>) {
    match result {
        Ok(robot) => print_done(what, &robot),
        Err(e) => report(&e),
    }
}

fn print_done(what: &str, robot: &Robot) {
    println!("{} {} {}", "✓".green().bold(), robot.name.bold(), what);
    print_robot(robot);
}

fn print_fleet(robots: &[Robot]) {
    println!(
        "  {:<16} {:<9} {:>24} {:>8}  {}",
        "NAME".bold(),
        "STATUS".bold(),
        "POSE (x, y, θ)".bold(),
        "BATTERY".bold(),
        "UPDATED".bold()
    );
    for robot in robots {
        print_robot(robot);
    }
}

fn print_robot(robot: &Robot) {
    let status = match robot.status {
        RobotStatus::Idle => robot.status.as_str().normal(),
        RobotStatus::Mission => robot.status.as_str().cyan(),
        RobotStatus::Charging => robot.status.as_str().yellow(),
        RobotStatus::Error => robot.status.as_str().red().bold(),
        RobotStatus::Offline => robot.status.as_str().dimmed(),
    };
    let pose = format!(
        "({:.2}, {:.2}, {:.2})",
        robot.pose.x, robot.pose.y, robot.pose.theta
    );
    println!(
        "  {:<16} {:<9} {:>24} {:>7.1}%  {}",
        robot.name,
        status,
        pose,
        robot.battery,
        robot.updated_at.format("%Y-%m-%d %H:%M:%S%.3f").to_string().dimmed()
    );
}

fn report(err: &FleetError) {
    let label = match err {
        FleetError::Unauthenticated => "Login required".yellow(),
        FleetError::InsufficientRole(_) => "Forbidden".yellow(),
        FleetError::StorageFault(_) => "Storage fault".red().bold(),
        _ => "Rejected".red(),
    };
    println!("{} {}: {}", "✗".red().bold(), label, err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_kernel::CapabilityGate;
    use fleet_registry::{FleetRegistry, SqliteRobotStore};

    fn make_service() -> (FleetService, Arc<FleetRegistry>) {
        let registry = Arc::new(FleetRegistry::new(Box::new(
            SqliteRobotStore::open_in_memory().unwrap(),
        )));
        let service = FleetService::new(Arc::clone(&registry), CapabilityGate::with_default_roles());
        (service, registry)
    }

    #[test]
    fn parses_login_with_roles() {
        assert_eq!(
            parse_command("/login ops operator viewer").unwrap(),
            Command::Login {
                user: "ops".into(),
                roles: vec!["operator".into(), "viewer".into()],
            }
        );
    }

    #[test]
    fn parses_register() {
        let cmd = parse_command("/register Tensrai1 mission 10 10 0 100").unwrap();
        assert_eq!(
            cmd,
            Command::Register(RobotInit::new(
                "Tensrai1",
                RobotStatus::Mission,
                Pose::new(10.0, 10.0, 0.0),
                100.0
            ))
        );
    }

    #[test]
    fn battery_sign_selects_delta() {
        assert_eq!(
            parse_command("/battery a -5").unwrap(),
            Command::Battery("a".into(), BatteryUpdate::Delta(-5.0))
        );
        assert_eq!(
            parse_command("/battery a +2.5").unwrap(),
            Command::Battery("a".into(), BatteryUpdate::Delta(2.5))
        );
        assert_eq!(
            parse_command("/battery a 80").unwrap(),
            Command::Battery("a".into(), BatteryUpdate::Absolute(80.0))
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_command("/status a DOCKED").is_err());
        assert!(parse_command("/pose a 1 two 3").is_err());
        assert!(parse_command("/remove").is_err());
        assert!(parse_command("/login").is_err());
        assert!(parse_command("/teleport a").is_err());
    }

    #[test]
    fn execute_threads_session_into_service() {
        let (service, registry) = make_service();
        let mut session = ResolvedSession::anonymous();

        // Anonymous register is refused before the registry is touched.
        execute(
            &service,
            &mut session,
            parse_command("/register bot idle 0 0 0 50").unwrap(),
        );
        assert!(!registry.exists("bot").unwrap());

        execute(&service, &mut session, parse_command("/login ops operator").unwrap());
        assert!(session.has_role("operator"));

        execute(
            &service,
            &mut session,
            parse_command("/register bot idle 0 0 0 50").unwrap(),
        );
        execute(&service, &mut session, parse_command("/battery bot -10").unwrap());
        let robot = registry.find_by_name("bot").unwrap().unwrap();
        assert_eq!(robot.battery, 40.0);

        execute(&service, &mut session, parse_command("/logout").unwrap());
        assert!(!session.is_authenticated());
    }
}
