//! `fleet-registry` – The Fleet Registry.
//!
//! Owns the durable collection of robots and every rule about how a robot
//! record may change.
//!
//! # Modules
//!
//! - [`store`] – [`RobotStore`][store::RobotStore]: the durable keyed store
//!   the registry writes through, with a SQLite implementation
//!   ([`SqliteRobotStore`][store::SqliteRobotStore]).
//! - [`transitions`] – [`TransitionPolicy`][transitions::TransitionPolicy]:
//!   the configurable status state machine.
//! - [`registry`] – [`FleetRegistry`][registry::FleetRegistry]: create,
//!   upsert, read, update and remove with per-name write serialization.
//! - [`seeder`] – [`Seeder`][seeder::Seeder]: idempotent bootstrap
//!   registration with a per-entry report.

pub mod registry;
pub mod seeder;
pub mod store;
pub mod transitions;

pub use registry::FleetRegistry;
pub use seeder::{SeedEntryReport, SeedOutcome, SeedReport, Seeder};
pub use store::{RobotStore, SqliteRobotStore, StoreError};
pub use transitions::{TransitionPolicy, TransitionRule};
