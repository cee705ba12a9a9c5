//! `fleet-kernel` – Authorization & Composition
//!
//! Decides who may touch the fleet and wires that decision in front of the
//! registry.  It does not store anything; it enforces rules.
//!
//! # Modules
//!
//! - [`session`] – [`Session`][session::Session]: the resolved caller
//!   context the host passes into every call, plus the plain-value
//!   [`ResolvedSession`][session::ResolvedSession].
//! - [`capability_gate`] – [`CapabilityGate`][capability_gate::CapabilityGate]:
//!   maps roles to [`Capability`][fleet_types::Capability] grants and answers
//!   allow/deny for a session.
//! - [`fleet_service`] – [`FleetService`][fleet_service::FleetService]: the
//!   single facade that checks the gate before delegating to
//!   [`FleetRegistry`][fleet_registry::FleetRegistry].

pub mod capability_gate;
pub mod fleet_service;
pub mod session;

pub use capability_gate::{
    Authorization, CapabilityGate, DenyReason, ROLE_ADMIN, ROLE_OPERATOR, ROLE_VIEWER,
};
pub use fleet_service::FleetService;
pub use session::{ResolvedSession, Session};
