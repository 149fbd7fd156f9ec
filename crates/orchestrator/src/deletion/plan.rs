use landing_zone_core::resource_types::{self, type_matches};
use landing_zone_core::{ManagedResource, PrivateEndpoint};
use serde::Serialize;
use uuid::Uuid;

/// A primary resource and the untagged artifacts deleted with it.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ResourceToDelete {
    pub resource: ManagedResource,
    /// Private endpoint whose connection targets this resource
    pub private_endpoint: Option<ManagedResource>,
    /// Provider-generated solutions whose name contains this resource's name
    pub solutions: Vec<ManagedResource>,
}

impl ResourceToDelete {
    pub fn new(resource: ManagedResource) -> Self {
        Self {
            resource,
            private_endpoint: None,
            solutions: Vec::new(),
        }
    }

    /// Every resource this record deletes, in deletion order: endpoint,
    /// then solutions, then the resource itself.
    pub fn deletion_order(&self) -> impl Iterator<Item = &ManagedResource> {
        self.private_endpoint
            .iter()
            .chain(self.solutions.iter())
            .chain(std::iter::once(&self.resource))
    }
}

/// Resources of one landing zone split by when they may be deleted.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeletionPlan {
    pub landing_zone_id: Uuid,
    /// Deleted first
    pub independent: Vec<ResourceToDelete>,
    /// Types others depend on; deleted after every independent record
    pub foundational: Vec<ResourceToDelete>,
}

impl DeletionPlan {
    pub fn records(&self) -> impl Iterator<Item = &ResourceToDelete> {
        self.independent.iter().chain(self.foundational.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.independent.is_empty() && self.foundational.is_empty()
    }

    pub fn resource_count(&self) -> usize {
        self.records().map(|r| r.deletion_order().count()).sum()
    }
}

/// Types that must outlive everything referencing them during deletion.
#[derive(Debug, Clone)]
pub struct FoundationalTypes {
    types: Vec<String>,
}

impl Default for FoundationalTypes {
    fn default() -> Self {
        Self {
            types: vec![
                resource_types::VIRTUAL_NETWORK.to_string(),
                resource_types::PRIVATE_DNS_ZONE.to_string(),
                resource_types::LOG_ANALYTICS_WORKSPACE.to_string(),
            ],
        }
    }
}

impl FoundationalTypes {
    pub fn with_type(mut self, resource_type: impl Into<String>) -> Self {
        self.types.push(resource_type.into());
        self
    }

    pub fn contains(&self, resource_type: &str) -> bool {
        self.types.iter().any(|t| type_matches(t, resource_type))
    }
}

/// Builds one record per tagged resource.
///
/// An endpoint or solution goes to the first resource it matches and to no
/// other. Solutions match when their name contains the resource's name,
/// which can over-associate when one name contains another.
pub(crate) fn associate(
    tagged: Vec<ManagedResource>,
    endpoints: &[PrivateEndpoint],
    solutions: &[ManagedResource],
) -> Vec<ResourceToDelete> {
    let mut endpoint_taken = vec![false; endpoints.len()];
    let mut solution_taken = vec![false; solutions.len()];

    tagged
        .into_iter()
        .map(|resource| {
            let mut record = ResourceToDelete::new(resource);

            if let Some(index) = endpoints
                .iter()
                .enumerate()
                .position(|(i, e)| !endpoint_taken[i] && e.targets(&record.resource.id))
            {
                endpoint_taken[index] = true;
                record.private_endpoint = Some(endpoints[index].resource.clone());
            }

            for (index, solution) in solutions.iter().enumerate() {
                if !solution_taken[index] && solution.name.contains(&record.resource.name) {
                    solution_taken[index] = true;
                    record.solutions.push(solution.clone());
                }
            }
            record
        })
        .collect()
}
