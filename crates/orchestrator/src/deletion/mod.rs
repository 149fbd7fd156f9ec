//! Tearing a landing zone down: discover its resources by tag, attach the
//! untagged artifacts that go with them, let the delete rules veto, then
//! delete ordinary resources before foundational ones.

mod manager;
mod plan;
mod rules;
mod strategy;

pub use manager::ResourcesDeleteManager;
pub use plan::{DeletionPlan, FoundationalTypes, ResourceToDelete};
pub use rules::{DeleteRule, DeleteRuleKind, DeleteRulesVerifier, Violation};
pub use strategy::{DeletionStrategies, DeletionStrategy};
