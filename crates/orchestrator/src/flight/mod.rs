//! Linear flights: ordered steps with per-step retry and reverse-order undo.
//!
//! A flight is a [`FlightDefinition`] (what to run) plus a durable
//! [`landing_zone_core::FlightRecord`] (how far it got and what its steps
//! wrote). The [`FlightRunner`] drives one flight; the [`LocalFlightEngine`]
//! hosts many and lets a step launch and await a nested flight.

mod await_flight;
mod context;
mod engine;
mod launch_flight;
mod retry;
mod runner;
mod step;
mod store;

pub use await_flight::AwaitSubFlightStep;
pub use context::FlightContext;
pub use engine::{FlightFactory, LocalFlightEngine, SubOperationEngine};
pub use launch_flight::{derive_sub_flight_id, LaunchSubFlightStep, SubFlightCompensation};
pub use retry::RetryRule;
pub use runner::{FlightDefinition, FlightRunner, FlightStep};
pub use step::{Step, StepKind, StepResult};
pub use store::{FlightStore, InMemoryFlightStore};
