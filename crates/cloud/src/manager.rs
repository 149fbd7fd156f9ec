use async_trait::async_trait;
use landing_zone_core::{ContainerRef, ManagedResource, PrivateEndpoint, ResourceSpec};

use crate::error::Result;

/// The cloud management API as the landing-zone service uses it.
///
/// Implementations surface provider failures as [`crate::CloudError`] and
/// never retry on their own; retry policy belongs to the flight engine.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// All resources in the container.
    async fn list_resources(&self, container: &ContainerRef) -> Result<Vec<ManagedResource>>;

    /// Private endpoints in the container with their connection targets.
    async fn list_private_endpoints(&self, container: &ContainerRef)
        -> Result<Vec<PrivateEndpoint>>;

    async fn get_resource(&self, resource_id: &str) -> Result<ManagedResource>;

    /// Create-only: fails with `Conflict` when the resource already exists.
    async fn create_resource(
        &self,
        container: &ContainerRef,
        spec: &ResourceSpec,
    ) -> Result<ManagedResource>;

    /// Generic delete-by-id.
    async fn delete_by_id(&self, resource_id: &str) -> Result<()>;

    /// Dedicated delete path for private DNS virtual network links, which the
    /// generic path cannot remove.
    async fn delete_network_link(&self, resource_id: &str) -> Result<()>;
}
