//! `fleetctl` – Fleet Registry host
//!
//! This binary owns the process lifecycle around the fleet core.  It:
//!
//! 1. Initialises structured logging (optionally exporting spans over OTLP).
//! 2. Loads `~/.fleet/config.toml`, writing a default one on first run.
//! 3. Opens the SQLite-backed registry and runs the bootstrap **seeder**.
//! 4. Drops the user into an **interactive shell** that resolves sessions
//!    and calls the capability-gated fleet service.
//! 5. Intercepts **Ctrl-C** to leave the shell and close the registry cleanly.

mod config;
mod repl;
mod telemetry;

use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

use fleet_kernel::FleetService;
use fleet_registry::{FleetRegistry, SeedOutcome, SeedReport, Seeder, SqliteRobotStore};

fn main() -> ExitCode {
    let _telemetry = telemetry::init_tracing("fleetctl");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    // ── Registry ──────────────────────────────────────────────────────────
    if let Some(parent) = Path::new(&cfg.database_path).parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        error!(path = %parent.display(), error = %e, "cannot create database directory");
    }
    let store = match SqliteRobotStore::open(&cfg.database_path) {
        Ok(store) => store,
        Err(e) => {
            error!(path = %cfg.database_path, error = %e, "failed to open fleet store");
            println!("{}: {}", "Cannot open fleet database".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };
    let registry = Arc::new(FleetRegistry::with_policy(
        Box::new(store),
        cfg.transition_policy(),
    ));
    info!(path = %cfg.database_path, "fleet registry opened");

    // ── Bootstrap seeding (runs before any session exists) ────────────────
    let report = Seeder::new(&registry).seed_all(&cfg.seed);
    print_seed_report(&report);

    // ── Interactive shell ─────────────────────────────────────────────────
    let service = FleetService::new(Arc::clone(&registry), cfg.capability_gate());
    match registry.len() {
        Ok(n) => println!("  Fleet size: {}\n", n.to_string().bold()),
        Err(e) => println!("  {}: {}\n", "Fleet size unavailable".red(), e),
    }
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(&service, shutdown);

    // ── Teardown ──────────────────────────────────────────────────────────
    drop(service);
    drop(registry);
    info!("fleet registry closed");
    ExitCode::SUCCESS
}

// ─────────────────────────────────────────────────────────────────────────────
// Output helpers
// ─────────────────────────────────────────────────────────────────────────────

fn print_seed_report(report: &SeedReport) {
    if report.entries.is_empty() {
        println!("  {}", "No seed entries configured.".dimmed());
        return;
    }
    println!("\n  {}", "Bootstrap seed".bold().underline());
    for entry in &report.entries {
        match &entry.outcome {
            SeedOutcome::Created => println!("    {} {} created", "✓".green(), entry.name.bold()),
            SeedOutcome::AlreadyExists => {
                println!("    {} {} already registered", "•".dimmed(), entry.name.bold())
            }
            SeedOutcome::Failed(e) => println!("    {} {} failed: {}", "✗".red(), entry.name.bold(), e),
        }
    }
    println!(
        "  {} created, {} existing, {} failed\n",
        report.created(),
        report.already_existing(),
        report.failed()
    );
}

fn print_banner() {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║            Fleet Registry            ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!(
        "  {} {}",
        "fleetctl".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!();
}
