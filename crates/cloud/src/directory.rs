use std::collections::HashSet;
use std::sync::Arc;

use landing_zone_core::{ContainerRef, ManagedResource, PrivateEndpoint};
use tracing::debug;

use crate::error::Result;
use crate::manager::ResourceManager;

/// Read-only queries over the resources of a container.
#[derive(Clone)]
pub struct ResourceDirectory {
    manager: Arc<dyn ResourceManager>,
}

impl ResourceDirectory {
    pub fn new(manager: Arc<dyn ResourceManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<dyn ResourceManager> {
        &self.manager
    }

    /// Resources carrying `tag_key = tag_value`.
    pub async fn list_by_tag(
        &self,
        container: &ContainerRef,
        tag_key: &str,
        tag_value: &str,
    ) -> Result<Vec<ManagedResource>> {
        let resources = self.manager.list_resources(container).await?;
        let matched = distinct(
            resources
                .into_iter()
                .filter(|r| r.has_tag(tag_key, tag_value)),
        );
        debug!(
            container = %container.scope(),
            tag_key,
            tag_value,
            count = matched.len(),
            "Listed resources by tag"
        );
        Ok(matched)
    }

    /// Resources of a provider-qualified type, tagged or not.
    pub async fn list_by_type(
        &self,
        container: &ContainerRef,
        resource_type: &str,
    ) -> Result<Vec<ManagedResource>> {
        let resources = self.manager.list_resources(container).await?;
        Ok(distinct(
            resources.into_iter().filter(|r| r.is_type(resource_type)),
        ))
    }

    pub async fn list_private_endpoints(
        &self,
        container: &ContainerRef,
    ) -> Result<Vec<PrivateEndpoint>> {
        self.manager.list_private_endpoints(container).await
    }
}

/// Keeps provider order, dropping repeated ids (case-insensitive).
fn distinct(resources: impl Iterator<Item = ManagedResource>) -> Vec<ManagedResource> {
    let mut seen = HashSet::new();
    resources
        .filter(|r| seen.insert(r.id.to_ascii_lowercase()))
        .collect()
}
