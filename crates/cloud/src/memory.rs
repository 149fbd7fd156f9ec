//! In-process provider used by the `memory` backend and by tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use landing_zone_core::resource_types::{self, type_matches};
use landing_zone_core::{ContainerRef, ManagedResource, PrivateEndpoint, ResourceSpec};
use tracing::debug;

use crate::error::{CloudError, Result};
use crate::manager::ResourceManager;

/// One call made against the fake provider, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudCall {
    List,
    ListPrivateEndpoints,
    Get(String),
    Create(String),
    Delete(String),
    DeleteNetworkLink(String),
}

impl CloudCall {
    fn kind(&self) -> CallKind {
        match self {
            CloudCall::List => CallKind::List,
            CloudCall::ListPrivateEndpoints => CallKind::ListPrivateEndpoints,
            CloudCall::Get(_) => CallKind::Get,
            CloudCall::Create(_) => CallKind::Create,
            CloudCall::Delete(_) => CallKind::Delete,
            CloudCall::DeleteNetworkLink(_) => CallKind::DeleteNetworkLink,
        }
    }

    fn target(&self) -> &str {
        match self {
            CloudCall::List | CloudCall::ListPrivateEndpoints => "",
            CloudCall::Get(id)
            | CloudCall::Create(id)
            | CloudCall::Delete(id)
            | CloudCall::DeleteNetworkLink(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    List,
    ListPrivateEndpoints,
    Get,
    Create,
    Delete,
    DeleteNetworkLink,
}

/// Derives an extra resource the provider creates on its own when a
/// resource of `trigger_type` is created.
type SideEffect = Box<dyn Fn(&ManagedResource) -> Option<ResourceSpec> + Send + Sync>;

struct InjectedFailure {
    kind: CallKind,
    target_fragment: String,
    error: CloudError,
    remaining: usize,
}

#[derive(Default)]
struct State {
    resources: Vec<ManagedResource>,
    calls: Vec<CloudCall>,
    failures: VecDeque<InjectedFailure>,
}

/// Fake provider holding resources in memory.
///
/// Behaves like the real API where the landing-zone flows care: create is
/// create-only, deletes cascade to child and extension resources, the generic
/// delete path refuses virtual network links, and registered side effects
/// create untagged companion resources.
pub struct InMemoryResourceManager {
    state: Mutex<State>,
    side_effects: Vec<(String, SideEffect)>,
}

impl InMemoryResourceManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            side_effects: Vec::new(),
        }
    }

    /// Enabling Sentinel on a workspace makes the provider add an untagged
    /// `SecurityInsights(<workspace>)` solution next to it.
    pub fn with_sentinel_solutions(self) -> Self {
        self.with_side_effect(resource_types::SENTINEL_ONBOARDING, |onboarding| {
            let workspace_id = onboarding.id.split("/providers/Microsoft.SecurityInsights").next()?;
            let workspace_name = workspace_id.rsplit('/').next()?;
            Some(ResourceSpec::new(
                resource_types::SOLUTION,
                format!("SecurityInsights({})", workspace_name),
                onboarding.region.clone(),
            ))
        })
    }

    pub fn with_side_effect<F>(mut self, trigger_type: &str, effect: F) -> Self
    where
        F: Fn(&ManagedResource) -> Option<ResourceSpec> + Send + Sync + 'static,
    {
        self.side_effects
            .push((trigger_type.to_string(), Box::new(effect)));
        self
    }

    /// Seeds a resource as if something outside the landing zone created it.
    pub fn insert(&self, resource: ManagedResource) {
        self.lock().resources.push(resource);
    }

    /// The next `times` calls of `kind` whose target contains `target_fragment`
    /// fail with `error`.
    pub fn inject_failure(
        &self,
        kind: CallKind,
        target_fragment: &str,
        error: CloudError,
        times: usize,
    ) {
        self.lock().failures.push_back(InjectedFailure {
            kind,
            target_fragment: target_fragment.to_string(),
            error,
            remaining: times,
        });
    }

    pub fn calls(&self) -> Vec<CloudCall> {
        self.lock().calls.clone()
    }

    /// Targets of every delete call, on either path, in call order.
    pub fn delete_calls(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                CloudCall::Delete(id) | CloudCall::DeleteNetworkLink(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn create_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, CloudCall::Create(_)))
            .count()
    }

    pub fn resources(&self) -> Vec<ManagedResource> {
        self.lock().resources.clone()
    }

    pub fn contains(&self, resource_id: &str) -> bool {
        self.lock()
            .resources
            .iter()
            .any(|r| r.id.eq_ignore_ascii_case(resource_id))
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records the call and returns an injected failure if one matches.
    fn record(&self, state: &mut State, call: CloudCall) -> Result<()> {
        let kind = call.kind();
        let target = call.target().to_ascii_lowercase();
        state.calls.push(call);

        let position = state.failures.iter().position(|f| {
            f.kind == kind && target.contains(&f.target_fragment.to_ascii_lowercase())
        });
        if let Some(index) = position {
            let failure = &mut state.failures[index];
            let error = failure.error.clone();
            failure.remaining = failure.remaining.saturating_sub(1);
            if failure.remaining == 0 {
                state.failures.remove(index);
            }
            return Err(error);
        }
        Ok(())
    }

    fn remove_with_children(state: &mut State, resource_id: &str) -> Result<()> {
        let before = state.resources.len();
        let prefix = format!("{}/", resource_id.to_ascii_lowercase());
        state.resources.retain(|r| {
            let id = r.id.to_ascii_lowercase();
            !(id.eq_ignore_ascii_case(resource_id) || id.starts_with(&prefix))
        });
        if state.resources.len() == before {
            return Err(CloudError::NotFound(resource_id.to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

fn in_scope(resource: &ManagedResource, container: &ContainerRef) -> bool {
    let scope = format!("{}/", container.scope().to_ascii_lowercase());
    resource.id.to_ascii_lowercase().starts_with(&scope)
}

#[async_trait]
impl ResourceManager for InMemoryResourceManager {
    async fn list_resources(&self, container: &ContainerRef) -> Result<Vec<ManagedResource>> {
        let mut state = self.lock();
        self.record(&mut state, CloudCall::List)?;
        Ok(state
            .resources
            .iter()
            .filter(|r| in_scope(r, container))
            .cloned()
            .collect())
    }

    async fn list_private_endpoints(
        &self,
        container: &ContainerRef,
    ) -> Result<Vec<PrivateEndpoint>> {
        let mut state = self.lock();
        self.record(&mut state, CloudCall::ListPrivateEndpoints)?;
        Ok(state
            .resources
            .iter()
            .filter(|r| in_scope(r, container) && r.is_type(resource_types::PRIVATE_ENDPOINT))
            .cloned()
            .map(PrivateEndpoint::from_resource)
            .collect())
    }

    async fn get_resource(&self, resource_id: &str) -> Result<ManagedResource> {
        let mut state = self.lock();
        self.record(&mut state, CloudCall::Get(resource_id.to_string()))?;
        state
            .resources
            .iter()
            .find(|r| r.id.eq_ignore_ascii_case(resource_id))
            .cloned()
            .ok_or_else(|| CloudError::NotFound(resource_id.to_string()))
    }

    async fn create_resource(
        &self,
        container: &ContainerRef,
        spec: &ResourceSpec,
    ) -> Result<ManagedResource> {
        let id = spec.resource_id(container);
        let mut state = self.lock();
        self.record(&mut state, CloudCall::Create(id.clone()))?;

        if state.resources.iter().any(|r| r.id.eq_ignore_ascii_case(&id)) {
            return Err(CloudError::Conflict(id));
        }

        let created = spec.clone().into_resource(container);
        state.resources.push(created.clone());
        debug!(resource_id = %created.id, "Created resource");

        for (trigger_type, effect) in &self.side_effects {
            if !type_matches(trigger_type, &created.resource_type) {
                continue;
            }
            if let Some(extra) = effect(&created) {
                let extra = extra.into_resource(container);
                if !state.resources.iter().any(|r| r.id.eq_ignore_ascii_case(&extra.id)) {
                    debug!(resource_id = %extra.id, "Provider side effect created resource");
                    state.resources.push(extra);
                }
            }
        }

        Ok(created)
    }

    async fn delete_by_id(&self, resource_id: &str) -> Result<()> {
        let mut state = self.lock();
        self.record(&mut state, CloudCall::Delete(resource_id.to_string()))?;

        let is_link = state
            .resources
            .iter()
            .find(|r| r.id.eq_ignore_ascii_case(resource_id))
            .is_some_and(|r| r.is_type(resource_types::VIRTUAL_NETWORK_LINK));
        if is_link {
            return Err(CloudError::Rejected {
                status: 400,
                code: Some("NoRegisteredProviderFound".to_string()),
                message: "generic delete is not supported for virtual network links".to_string(),
            });
        }

        Self::remove_with_children(&mut state, resource_id)
    }

    async fn delete_network_link(&self, resource_id: &str) -> Result<()> {
        let mut state = self.lock();
        self.record(&mut state, CloudCall::DeleteNetworkLink(resource_id.to_string()))?;
        Self::remove_with_children(&mut state, resource_id)
    }
}
