//! Cloud resource management for landing zones.
//!
//! [`ResourceManager`] is the provider seam; [`ResourceDirectory`] is the
//! read-only query surface the deletion orchestrator works from.

pub mod directory;
pub mod error;
pub mod manager;
pub mod memory;
pub mod rest;

pub use directory::ResourceDirectory;
pub use error::{classify_provider_error, CloudError, Result};
pub use manager::ResourceManager;
pub use memory::{CallKind, CloudCall, InMemoryResourceManager};
pub use rest::{RestConfig, RestResourceManager};
