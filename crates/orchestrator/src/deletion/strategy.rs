use std::collections::HashMap;

use cloud::{ResourceManager, Result};
use landing_zone_core::resource_types;
use landing_zone_core::ManagedResource;

/// How a resource of a given type is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionStrategy {
    /// Delete-by-id
    Generic,
    /// Private DNS virtual network links; delete-by-id fails for them
    NetworkLink,
}

/// Type to deletion strategy, defaulting to [`DeletionStrategy::Generic`].
#[derive(Debug, Clone)]
pub struct DeletionStrategies {
    overrides: HashMap<String, DeletionStrategy>,
}

impl Default for DeletionStrategies {
    fn default() -> Self {
        Self::empty().with_strategy(
            resource_types::VIRTUAL_NETWORK_LINK,
            DeletionStrategy::NetworkLink,
        )
    }
}

impl DeletionStrategies {
    pub fn empty() -> Self {
        Self {
            overrides: HashMap::new(),
        }
    }

    pub fn with_strategy(mut self, resource_type: &str, strategy: DeletionStrategy) -> Self {
        self.overrides
            .insert(resource_type.to_ascii_lowercase(), strategy);
        self
    }

    pub fn strategy_for(&self, resource_type: &str) -> DeletionStrategy {
        self.overrides
            .get(&resource_type.to_ascii_lowercase())
            .copied()
            .unwrap_or(DeletionStrategy::Generic)
    }

    pub async fn delete(&self, manager: &dyn ResourceManager, resource: &ManagedResource) -> Result<()> {
        match self.strategy_for(&resource.resource_type) {
            DeletionStrategy::Generic => manager.delete_by_id(&resource.id).await,
            DeletionStrategy::NetworkLink => manager.delete_network_link(&resource.id).await,
        }
    }
}
