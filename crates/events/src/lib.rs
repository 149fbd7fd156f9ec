//! Flight and landing-zone lifecycle events.
//!
//! Steps, the flight runner and the deletion orchestrator publish here; the
//! HTTP layer streams the envelopes to clients.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
