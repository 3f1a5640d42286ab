//! Resource Inventory: typed reads over [`CloudProvider::list_resources`].
//!
//! Each read is one provider call with no retries.

use costguard_core::{Resource, ResourceKind, ResourceState};
use costguard_provider::{CloudProvider, ProviderError};

/// Instance states that accrue compute charges.
pub const BILLING_STATES: &[ResourceState] = &[ResourceState::Running, ResourceState::Pending];

/// Instance states the tag policy looks at.
pub const TAGGABLE_INSTANCE_STATES: &[ResourceState] = &[
    ResourceState::Running,
    ResourceState::Pending,
    ResourceState::Stopping,
    ResourceState::Stopped,
];

/// Spot request states that can still launch capacity.
pub const LIVE_SPOT_STATES: &[ResourceState] = &[ResourceState::Open, ResourceState::Active];

pub struct Inventory<'a> {
    provider: &'a dyn CloudProvider,
}

impl<'a> Inventory<'a> {
    pub fn new(provider: &'a dyn CloudProvider) -> Self {
        Inventory { provider }
    }

    /// Resources of `kind` in any of `states`; an empty filter lists all states.
    pub async fn list_resources(
        &self,
        kind: ResourceKind,
        states: &[ResourceState],
    ) -> Result<Vec<Resource>, ProviderError> {
        self.provider.list_resources(kind, states).await
    }

    /// Running and pending instances.
    pub async fn billing_instances(&self) -> Result<Vec<Resource>, ProviderError> {
        self.list_resources(ResourceKind::ComputeInstance, BILLING_STATES)
            .await
    }

    /// Every instance the provider reports, regardless of state or tags.
    pub async fn all_instances(&self) -> Result<Vec<Resource>, ProviderError> {
        self.list_resources(ResourceKind::ComputeInstance, &[]).await
    }

    pub async fn taggable_instances(&self) -> Result<Vec<Resource>, ProviderError> {
        self.list_resources(ResourceKind::ComputeInstance, TAGGABLE_INSTANCE_STATES)
            .await
    }

    pub async fn live_spot_requests(&self) -> Result<Vec<Resource>, ProviderError> {
        self.list_resources(ResourceKind::SpotRequest, LIVE_SPOT_STATES)
            .await
    }

    /// Volumes not attached to any instance.
    pub async fn unattached_volumes(&self) -> Result<Vec<Resource>, ProviderError> {
        self.list_resources(ResourceKind::Volume, &[ResourceState::Available])
            .await
    }

    pub async fn volumes(&self) -> Result<Vec<Resource>, ProviderError> {
        self.list_resources(
            ResourceKind::Volume,
            &[ResourceState::Available, ResourceState::Attached],
        )
        .await
    }

    pub async fn snapshots(&self) -> Result<Vec<Resource>, ProviderError> {
        self.list_resources(ResourceKind::Snapshot, &[]).await
    }
}
